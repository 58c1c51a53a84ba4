//! The `candor init` command.

use std::path::Path;

use anyhow::Result;

use candor_core::profile::DEFAULT_PROFILE_TOML;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("candor.toml"), SAMPLE_CONFIG)?;
    write_if_missing(Path::new("profile.toml"), DEFAULT_PROFILE_TOML)?;

    std::fs::create_dir_all("transcripts")?;
    write_if_missing(Path::new("transcripts/example.toml"), EXAMPLE_TRANSCRIPT)?;

    println!("\nNext steps:");
    println!("  1. Tune profile.toml (dimension weights, evidence tags, thresholds)");
    println!("  2. Run: candor validate --transcript transcripts/example.toml --profile profile.toml");
    println!("  3. Run: candor run --transcript transcripts/example.toml --format all");

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

const SAMPLE_CONFIG: &str = r#"# candor configuration

# "rule-based", or the name of a provider below
strategy = "rule-based"
strategy_timeout_ms = 10000
profile = "profile.toml"
output_dir = "./candor-results"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
"#;

const EXAMPLE_TRANSCRIPT: &str = r#"[session]
label = "Example interview"

[[questions]]
type = "technical"
text = "How would you find the slowest endpoint in a web service?"
response = """
First, I would check the latency dashboards, because p99 by route usually \
points at the culprit. Then I would profile that handler. For example, last \
year a missing index made one endpoint take 2 seconds.
"""

[[questions]]
type = "behavioral"
text = "Tell me about a decision you later regretted."
response = """
I pushed a rewrite without buy-in from the team. In hindsight I should have \
written a short proposal first; I now share designs before I start coding.
"""

[[questions]]
type = "situational"
text = "Two teams need your help on the same day. What do you do?"
response = """
I would ask both leads about deadlines and impact, then prioritize the one \
blocking a release and give the other a clear time when I can help.
"""
"#;
