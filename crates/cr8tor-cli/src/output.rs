use cr8tor_core::lifecycle::Completion;
use serde::Serialize;

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the one line a lifecycle command ends with: success on stdout,
/// failure on stderr. With `--json` the whole completion goes to stdout.
pub fn print_completion(completion: &Completion, json: bool) {
    if json {
        if let Err(e) = print_json(completion) {
            eprintln!("error: {e:#}");
        }
    } else if completion.is_success() {
        println!("{}", completion.final_line());
    } else {
        eprintln!("{}", completion.final_line());
    }
}

/// Left-aligned columns separated by two spaces.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let widths: Vec<usize> = (0..headers.len())
        .map(|i| {
            rows.iter()
                .filter_map(|r| r.get(i))
                .map(String::len)
                .fold(headers[i].len(), usize::max)
        })
        .collect();

    print_row(headers.iter().copied(), &widths);
    let sep: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    print_row(sep.iter().map(String::as_str), &widths);
    for row in rows {
        print_row(row.iter().map(String::as_str), &widths);
    }
}

fn print_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let padded: Vec<String> = cells
        .zip(widths)
        .map(|(c, &w)| format!("{c:w$}"))
        .collect();
    println!("{}", padded.join("  ").trim_end());
}

/// Placeholder for an empty table cell.
pub fn or_dash(value: Option<impl ToString>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
