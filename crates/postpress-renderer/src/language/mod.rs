//! Language metadata and the runtime language service.
//!
//! The static table below mirrors the component metadata the highlighter
//! ships: a canonical identifier, the aliases that resolve to it, the
//! definitions that must be registered before it, and a display name for the
//! enhancement toolbar.

mod resolver;

pub use resolver::{DefinitionFetcher, HttpFetcher, LanguageService};

use crate::blocks::LANGUAGE_CLASS_RE;
use smol_str::SmolStr;
use std::collections::{BTreeSet, HashMap};
use std::sync::LazyLock;

/// Canonical language identifiers that mean "no grammar, render plain".
pub const PLAIN_TEXT: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LanguageDescriptor {
    /// Canonical identifier the definition is registered under.
    pub name: &'static str,
    /// Human-readable name for toolbar labels.
    pub display: &'static str,
    /// Alias tokens that resolve to this language.
    pub aliases: &'static [&'static str],
    /// Canonical identifiers that must be registered first.
    pub deps: &'static [&'static str],
}

/// Static language metadata table, derived once at startup into the alias
/// map. Order is irrelevant; dependency edges refer to canonical names.
pub const LANGUAGES: &[LanguageDescriptor] = &[
    LanguageDescriptor {
        name: "markup",
        display: "Markup",
        aliases: &["html", "xml", "svg", "mathml"],
        deps: &[],
    },
    LanguageDescriptor {
        name: "css",
        display: "CSS",
        aliases: &[],
        deps: &[],
    },
    LanguageDescriptor {
        name: "clike",
        display: "C-like",
        aliases: &[],
        deps: &[],
    },
    LanguageDescriptor {
        name: "javascript",
        display: "JavaScript",
        aliases: &["js", "mjs", "cjs"],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "typescript",
        display: "TypeScript",
        aliases: &["ts"],
        deps: &["javascript"],
    },
    LanguageDescriptor {
        name: "jsx",
        display: "React JSX",
        aliases: &[],
        deps: &["markup", "javascript"],
    },
    LanguageDescriptor {
        name: "tsx",
        display: "React TSX",
        aliases: &[],
        deps: &["jsx", "typescript"],
    },
    LanguageDescriptor {
        name: "c",
        display: "C",
        aliases: &[],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "cpp",
        display: "C++",
        aliases: &["c++"],
        deps: &["c"],
    },
    LanguageDescriptor {
        name: "csharp",
        display: "C#",
        aliases: &["cs", "dotnet"],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "java",
        display: "Java",
        aliases: &[],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "kotlin",
        display: "Kotlin",
        aliases: &["kt", "kts"],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "python",
        display: "Python",
        aliases: &["py"],
        deps: &[],
    },
    LanguageDescriptor {
        name: "rust",
        display: "Rust",
        aliases: &["rs"],
        deps: &[],
    },
    LanguageDescriptor {
        name: "go",
        display: "Go",
        aliases: &["golang"],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "ruby",
        display: "Ruby",
        aliases: &["rb"],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "php",
        display: "PHP",
        aliases: &[],
        deps: &["clike", "markup"],
    },
    LanguageDescriptor {
        name: "sql",
        display: "SQL",
        aliases: &[],
        deps: &[],
    },
    LanguageDescriptor {
        name: "bash",
        display: "Bash",
        aliases: &["sh", "shell", "zsh"],
        deps: &[],
    },
    LanguageDescriptor {
        name: "json",
        display: "JSON",
        aliases: &["webmanifest"],
        deps: &[],
    },
    LanguageDescriptor {
        name: "yaml",
        display: "YAML",
        aliases: &["yml"],
        deps: &[],
    },
    LanguageDescriptor {
        name: "toml",
        display: "TOML",
        aliases: &[],
        deps: &[],
    },
    LanguageDescriptor {
        name: "markdown",
        display: "Markdown",
        aliases: &["md"],
        deps: &["markup"],
    },
    LanguageDescriptor {
        name: "scss",
        display: "SCSS",
        aliases: &[],
        deps: &["css"],
    },
    LanguageDescriptor {
        name: "swift",
        display: "Swift",
        aliases: &[],
        deps: &["clike"],
    },
    LanguageDescriptor {
        name: "diff",
        display: "Diff",
        aliases: &["patch"],
        deps: &[],
    },
    LanguageDescriptor {
        name: PLAIN_TEXT,
        display: "Plain Text",
        aliases: &["plaintext", "txt", "plain", "none"],
        deps: &[],
    },
];

/// Flat alias lookup: every canonical name maps to itself, every declared
/// alias maps to its canonical descriptor.
static ALIAS_MAP: LazyLock<HashMap<&'static str, &'static LanguageDescriptor>> =
    LazyLock::new(|| {
        let mut map = HashMap::new();
        for descriptor in LANGUAGES {
            map.insert(descriptor.name, descriptor);
            for alias in descriptor.aliases {
                map.insert(*alias, descriptor);
            }
        }
        map
    });

/// Look up a descriptor by canonical name or alias. Matching is
/// case-insensitive for tokens that are not already lowercase.
pub fn descriptor(token: &str) -> Option<&'static LanguageDescriptor> {
    if let Some(found) = ALIAS_MAP.get(token) {
        return Some(found);
    }
    let lowered = token.to_ascii_lowercase();
    ALIAS_MAP.get(lowered.as_str()).copied()
}

/// Canonical identifier for a token, if the token is known.
pub fn canonical(token: &str) -> Option<SmolStr> {
    descriptor(token).map(|d| SmolStr::new(d.name))
}

/// Human-readable name for a toolbar label. Unknown identifiers fall back to
/// the uppercased raw token.
pub fn display_name(token: &str) -> String {
    match descriptor(token) {
        Some(found) => found.display.to_owned(),
        None => token.to_ascii_uppercase(),
    }
}

/// Distinct `language-X` tokens appearing anywhere in an HTML string, used to
/// drive batch resolution ahead of the highlight pass.
pub fn languages_in(html: &str) -> BTreeSet<SmolStr> {
    LANGUAGE_CLASS_RE
        .captures_iter(html)
        .map(|caps| SmolStr::new(&caps[1]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_resolve_to_canonical() {
        assert_eq!(canonical("js").as_deref(), Some("javascript"));
        assert_eq!(canonical("javascript").as_deref(), Some("javascript"));
        assert_eq!(canonical("yml").as_deref(), Some("yaml"));
        assert_eq!(canonical("TXT").as_deref(), Some("text"));
        assert_eq!(canonical("befunge"), None);
    }

    #[test]
    fn every_dependency_is_a_canonical_name() {
        for descriptor in LANGUAGES {
            for dep in descriptor.deps {
                let resolved = canonical(dep).expect("dependency must be declared");
                assert_eq!(resolved.as_str(), *dep, "deps must use canonical names");
            }
        }
    }

    #[test]
    fn no_alias_collides_with_a_canonical_name() {
        for descriptor in LANGUAGES {
            for alias in descriptor.aliases {
                assert_eq!(
                    canonical(alias).as_deref(),
                    Some(descriptor.name),
                    "alias {alias} must map to {}",
                    descriptor.name
                );
            }
        }
    }

    #[test]
    fn display_name_falls_back_to_uppercase() {
        assert_eq!(display_name("python"), "Python");
        assert_eq!(display_name("cpp"), "C++");
        assert_eq!(display_name("brainmuck"), "BRAINMUCK");
    }

    #[test]
    fn languages_in_extracts_distinct_tokens() {
        let html = r#"<code class="language-sql">select 1</code>
            <code class="language-python">x</code>
            <code class="language-sql">select 2</code>"#;
        let found = languages_in(html);
        assert_eq!(
            found,
            BTreeSet::from([SmolStr::new("sql"), SmolStr::new("python")])
        );
    }

    #[test]
    fn languages_in_ignores_plain_blocks() {
        assert!(languages_in("<pre><code>plain</code></pre>").is_empty());
    }
}
