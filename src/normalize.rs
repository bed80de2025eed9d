/// Canonical comparable form of a plate or tag: whitespace and hyphens
/// removed, upper-cased. `"AB-123 CD"` and `"ab123cd"` both become `"AB123CD"`.
pub fn normalize(s: Option<&str>) -> String {
    let Some(s) = s else {
        return String::new();
    };
    s.chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase()
}
