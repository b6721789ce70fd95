pub fn header(level: usize, text: &str) -> String {
    let level = level.max(1);
    format!("{} {}", "#".repeat(level), text)
}

pub fn bold(label: &str, value: &str) -> String {
    format!("**{}:** {}", label, value)
}

pub fn bullet(label: &str, value: &str) -> String {
    format!("- {}", bold(label, value))
}

pub fn table_header(columns: &[&str]) -> [String; 2] {
    [
        table_row(columns),
        format!("|{}", " --- |".repeat(columns.len())),
    ]
}

pub fn table_row(cells: &[&str]) -> String {
    format!("| {} |", cells.join(" | "))
}

pub fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
