//! The `dialang init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("dialang.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("scripts")?;
    write_if_missing(Path::new("scripts/session.toml"), EXAMPLE_SESSION)?;

    println!("\nNext steps:");
    println!("  1. Point catalog_dir in dialang.toml at your catalog tables");
    println!("  2. Run: dialang validate");
    println!("  3. Run: dialang run --script scripts/session.toml");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# dialang configuration

catalog_dir = "./catalog"

# Append capture events to a JSON-lines file.
# capture_file = "./capture.jsonl"

# Where test-takers go once a test is done. ${VAR} references are expanded.
# test_complete_url = "https://${DIALANG_HOST}/done"

session_lifetime_hours = 24
"#;

const EXAMPLE_SESSION: &str = r#"# A scripted reading test.
#
# Field names match the forms a test-taker would submit. Provide responses
# for every basket the selected booklet may present.

admin_language = "eng"
test_language = "eng"
skill = "reading"

[tes]
# difficulty = "medium"

[client]
browser_locale = "en-GB"

[vspt]
"word:eng-r01" = "valid"
"word:eng-f01" = "invalid"

[sa]
"statement:R1" = "yes"
"statement:R2" = "no"

[baskets.10]
basketType = "mcq"
itemId = 1001
response = 10011

[questionnaire]
age_group = "25-34"
"#;
