//! Static registry of deployable script templates.

use once_cell::sync::Lazy;

/// Line prepended to scripts that expect a browser-style `window` global.
pub const WINDOW_SHIM: &str = "var window = globalThis;";

#[derive(Debug, Clone)]
pub struct TemplateConfig {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub source_url: &'static str,
    pub default_variables: &'static [&'static str],
    pub identity_variable: &'static str,
    pub patch: fn(&str) -> String,
}

impl TemplateConfig {
    pub fn apply_patch(&self, script: &str) -> String {
        (self.patch)(script)
    }

    pub fn is_default_variable(&self, key: &str) -> bool {
        self.default_variables.contains(&key)
    }
}

static TEMPLATES: Lazy<Vec<TemplateConfig>> = Lazy::new(|| {
    vec![
        TemplateConfig {
            id: "cmliu",
            name: "CMliu - EdgeTunnel",
            description: "EdgeTunnel worker with the standard variable set",
            source_url: "https://raw.githubusercontent.com/cmliu/edgetunnel/beta2.0/_worker.js",
            default_variables: &["UUID", "PROXYIP", "PATH", "URL", "KEY", "ADMIN"],
            identity_variable: "UUID",
            patch: unpatched,
        },
        TemplateConfig {
            id: "joey",
            name: "Joey - CFNew",
            description: "CFNew worker, patched with a window shim",
            source_url: "https://raw.githubusercontent.com/byJoey/cfnew/main/%E5%B0%91%E5%B9%B4%E4%BD%A0%E7%9B%B8%E4%BF%A1%E5%85%89%E5%90%97",
            default_variables: &["u"],
            identity_variable: "u",
            patch: prepend_window_shim,
        },
    ]
});

pub fn all_templates() -> &'static [TemplateConfig] {
    TEMPLATES.as_slice()
}

pub fn resolve(template_id: &str) -> Option<&'static TemplateConfig> {
    TEMPLATES.iter().find(|template| template.id == template_id)
}

fn unpatched(script: &str) -> String {
    script.to_string()
}

/// Prepends [`WINDOW_SHIM`] unless the script already starts with it.
fn prepend_window_shim(script: &str) -> String {
    if script.lines().next().map(str::trim) == Some(WINDOW_SHIM) {
        return script.to_string();
    }
    format!("{WINDOW_SHIM}\n{script}")
}
