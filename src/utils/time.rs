/// Render a second count the way the exam header shows it: `M:SS`.
pub fn format_clock(seconds: u64) -> String {
    let minutes = seconds / 60;
    let rest = seconds % 60;
    format!("{}:{:02}", minutes, rest)
}
