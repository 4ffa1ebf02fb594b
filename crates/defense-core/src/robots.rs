// robots.txt parsing (SPEC_FULL.md §4.5.3). Loaded once at startup; disallow
// rules under `User-agent: *` only, matched as path prefixes.

#[derive(Debug, Clone, Default)]
pub struct RobotsRules {
    disallow_prefixes: Vec<String>,
}

impl RobotsRules {
    pub fn parse(body: &str) -> Self {
        let mut disallow_prefixes = Vec::new();
        let mut in_wildcard_block = false;

        for raw_line in body.lines() {
            let line = strip_comment(raw_line).trim();
            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => in_wildcard_block = value == "*",
                "disallow" if in_wildcard_block => {
                    // Rule `/` would disallow everything; spec says ignore it.
                    if !value.is_empty() && value != "/" {
                        disallow_prefixes.push(value.to_string());
                    }
                }
                _ => {}
            }
        }

        Self { disallow_prefixes }
    }

    /// A path is disallowed iff some rule is a prefix of the normalised path
    /// (path always leading with `/`).
    pub fn is_disallowed(&self, normalized_path: &str) -> bool {
        self.disallow_prefixes
            .iter()
            .any(|prefix| normalized_path.starts_with(prefix.as_str()))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(idx) => &line[..idx],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
User-agent: *
Disallow: /wp-admin
Disallow: /wp-login.php
Disallow: /

User-agent: SomeOtherBot
Disallow: /everything
";

    #[test]
    fn matches_wildcard_block_prefixes_only() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(rules.is_disallowed("/wp-admin"));
        assert!(rules.is_disallowed("/wp-admin/edit.php"));
        assert!(rules.is_disallowed("/wp-login.php"));
        assert!(!rules.is_disallowed("/everything"));
    }

    #[test]
    fn bare_slash_rule_is_ignored() {
        let rules = RobotsRules::parse(SAMPLE);
        assert!(!rules.is_disallowed("/totally-unrelated"));
    }

    #[test]
    fn empty_body_disallows_nothing() {
        let rules = RobotsRules::parse("");
        assert!(!rules.is_disallowed("/anything"));
    }
}
