use std::sync::OnceLock;

use regex::Regex;

/// Expand `{{ env.VAR }}` placeholders in raw TOML text using the process environment
///
/// `{{ env.VAR | default("fallback") }}` substitutes the fallback when the
/// variable is unset. Comment lines are left untouched so disabled entries
/// never require their variables.
pub fn expand_env(input: &str) -> anyhow::Result<String> {
    expand_with(input, |name| std::env::var(name).ok())
}

fn placeholder() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{\{\s*(?P<scope>[A-Za-z0-9_]+)\.(?P<name>[A-Za-z0-9_]+)\s*(?:\|\s*default\("(?P<default>[^"]*)"\)\s*)?\}\}"#)
            .expect("placeholder pattern is valid")
    })
}

fn expand_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<String> {
    let mut output = String::with_capacity(input.len());

    for line in input.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            output.push_str(line);
            continue;
        }

        let mut cursor = 0;
        for caps in placeholder().captures_iter(line) {
            let (Some(whole), Some(scope), Some(name)) = (caps.get(0), caps.name("scope"), caps.name("name")) else {
                continue;
            };

            if scope.as_str() != "env" {
                anyhow::bail!("only variables scoped with 'env.' are supported: `{}`", whole.as_str());
            }

            output.push_str(&line[cursor..whole.start()]);

            match (lookup(name.as_str()), caps.name("default")) {
                (Some(value), _) => output.push_str(&value),
                (None, Some(default)) => output.push_str(default.as_str()),
                (None, None) => anyhow::bail!("environment variable not found: `{}`", name.as_str()),
            }

            cursor = whole.end();
        }
        output.push_str(&line[cursor..]);
    }

    Ok(output)
}
