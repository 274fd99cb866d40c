use std::fmt::Write as _;

use crate::schema::FieldDefinition;

/// Renders output attributes as an aligned `# / name / type` table.
pub fn render_attributes(attributes: &[FieldDefinition]) -> String {
    let headers = ["#".to_string(), "name".to_string(), "type".to_string()];
    let rows = attributes
        .iter()
        .enumerate()
        .map(|(idx, field)| {
            [
                (idx + 1).to_string(),
                sanitize_cell(&field.name),
                field.field_type.to_string(),
            ]
        })
        .collect::<Vec<_>>();

    let mut widths = headers.each_ref().map(|h| h.chars().count().max(3));
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(&headers, &widths));
    let separator = widths.map(|w| "-".repeat(w));
    let _ = writeln!(output, "{}", format_row(&separator, &widths));
    for row in &rows {
        let _ = writeln!(output, "{}", format_row(row, &widths));
    }
    output
}

fn format_row(cells: &[String; 3], widths: &[usize; 3]) -> String {
    let mut line = cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ");
    while line.ends_with(' ') {
        line.pop();
    }
    line
}

fn sanitize_cell(value: &str) -> String {
    value
        .chars()
        .map(|ch| match ch {
            '\n' | '\r' | '\t' => ' ',
            other => other,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldType;

    #[test]
    fn renders_aligned_rows() {
        let rendered = render_attributes(&[
            FieldDefinition::new("Temperature", FieldType::Double),
            FieldDefinition::string("Source"),
        ]);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "#    name         type");
        assert_eq!(lines[1], "---  -----------  ------");
        assert_eq!(lines[2], "1    Temperature  Double");
        assert_eq!(lines[3], "2    Source       String");
    }

    #[test]
    fn control_characters_are_flattened() {
        let rendered = render_attributes(&[FieldDefinition::string("a\tb")]);
        assert!(rendered.contains("a b"));
    }
}
