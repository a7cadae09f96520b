//! CSV Export
//!
//! Serializes a full view as delimited text with a header row. Fields are
//! quoted per RFC 4180 when they contain the delimiter, a quote, or a line
//! break.

use serde_json::Value;

/// Render columns plus rows of JSON cells into CSV text.
pub fn to_csv(columns: &[String], rows: &[Vec<Value>]) -> String {
    let mut out = String::new();
    write_record(&mut out, columns.iter().map(|c| c.as_str()));
    let mut fields = Vec::new();
    for row in rows {
        fields.clear();
        fields.extend(row.iter().map(cell_text));
        write_record(&mut out, fields.iter().map(|f| f.as_str()));
    }
    out
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn write_record<'a>(out: &mut String, fields: impl Iterator<Item = &'a str>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push_str("\r\n");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_header_and_rows() {
        let columns = vec!["id".to_string(), "name".to_string()];
        let rows = vec![
            vec![json!(1), json!("Aarav Sharma")],
            vec![json!(2), json!("Meera Patel")],
        ];
        let csv = to_csv(&columns, &rows);
        assert_eq!(csv, "id,name\r\n1,Aarav Sharma\r\n2,Meera Patel\r\n");
    }

    #[test]
    fn test_quoting() {
        let columns = vec!["address".to_string(), "note".to_string()];
        let rows = vec![vec![
            json!("12 Nair Road, Pune"),
            json!("said \"ok\"\nthen left"),
        ]];
        let csv = to_csv(&columns, &rows);
        assert_eq!(
            csv,
            "address,note\r\n\"12 Nair Road, Pune\",\"said \"\"ok\"\"\nthen left\"\r\n"
        );
    }

    #[test]
    fn test_null_is_empty_field() {
        let columns = vec!["a".to_string(), "b".to_string()];
        let rows = vec![vec![json!(null), json!(2.5)]];
        assert_eq!(to_csv(&columns, &rows), "a,b\r\n,2.5\r\n");
    }

    #[test]
    fn test_empty_view_is_header_only() {
        let columns = vec!["id".to_string()];
        assert_eq!(to_csv(&columns, &[]), "id\r\n");
    }
}
