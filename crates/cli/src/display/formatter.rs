use anyhow::{Context, Result};
use serde::Serialize;

/// Prints one item per line, or a JSON array when `json` is set
pub fn print_lines<I, S>(items: I, json: bool) -> Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let items: Vec<String> = items
        .into_iter()
        .map(|item| item.as_ref().to_string())
        .collect();

    if json {
        print_json(&items)
    } else {
        for item in &items {
            println!("{item}");
        }
        Ok(())
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}
