use bale_config::parse_global;

/// Parse `package=Global` for `--global`.
pub fn parse_global_pair(s: &str) -> Result<(String, String), String> {
    let Some((package, global)) = s.split_once('=') else {
        return Err(format!("expected PACKAGE=GLOBAL, got '{s}'"));
    };
    let package = package.trim();
    if package.is_empty() {
        return Err(format!("missing package name in '{s}'"));
    }
    Ok((package.to_string(), parse_global(global.trim())?))
}
