use serde_json::Value;

const MAX_COL_WIDTH: usize = 48;

/// Render JSON records as an ASCII table with the given columns, in order.
/// Missing fields render empty; `None` when there is nothing to show.
pub fn render_records(records: &[Value], columns: &[&str]) -> Option<String> {
    if records.is_empty() || columns.is_empty() { return None; }
    let header: Vec<String> = columns.iter().map(|c| c.to_string()).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| columns.iter().map(|c| r.get(*c).map(cell_text).unwrap_or_default()).collect())
        .collect();
    Some(render_table(&header, &rows))
}

fn render_table(header: &[String], rows: &[Vec<String>]) -> String {
    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            std::iter::once(&header[i])
                .chain(rows.iter().filter_map(|r| r.get(i)))
                .map(|s| s.chars().count())
                .max()
                .unwrap_or(0)
                .min(MAX_COL_WIDTH)
        })
        .collect();
    let rule = format!("+{}+", widths.iter().map(|w| "-".repeat(w + 2)).collect::<Vec<_>>().join("+"));
    let line = |cells: &[String]| -> String {
        let body: Vec<String> = widths
            .iter()
            .enumerate()
            .map(|(i, &w)| {
                let raw = cells.get(i).map(String::as_str).unwrap_or("");
                let text = clip(raw, w);
                if looks_numeric(raw) { format!(" {:>w$} ", text, w = w) } else { format!(" {:<w$} ", text, w = w) }
            })
            .collect();
        format!("|{}|", body.join("|"))
    };

    let mut out = vec![rule.clone(), line(header), rule.clone()];
    out.extend(rows.iter().map(|r| line(r.as_slice())));
    out.push(rule);
    out.push(format!("rows: {}", rows.len()));
    out.join("\n")
}

fn cell_text(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max { return s.to_string(); }
    let kept: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept)
}

// vote counts and percentages right-align
fn looks_numeric(s: &str) -> bool {
    let s = s.trim();
    s.chars().any(|c| c.is_ascii_digit()) && s.chars().all(|c| c.is_ascii_digit() || ".%-".contains(c))
}
