use anyhow::Result;
use std::io::Write;

use crate::builds::BuildView;

/// Writes the build list as JSON, one document per call.
pub fn export_builds(builds: &[BuildView], pretty: bool, output: &mut dyn Write) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(builds)?
    } else {
        serde_json::to_string(builds)?
    };
    writeln!(output, "{}", json)?;
    Ok(())
}
