//! Entry document generation.

use minijinja::{context, AutoEscape, Environment};

use lectern_bundle::Manifest;

use crate::config::BuildConfig;

const TEMPLATE_NAME: &str = "index.html";

/// Renders the project's page template.
pub struct TemplateEngine {
    env: Environment<'static>,
}

impl TemplateEngine {
    /// Compile `source` (minijinja syntax).
    pub fn new(source: String) -> Result<Self, minijinja::Error> {
        let mut env = Environment::new();
        // Values are URLs and paths that go into attributes as written.
        env.set_auto_escape_callback(|_| AutoEscape::None);
        env.add_template_owned(TEMPLATE_NAME.to_string(), source)?;
        Ok(Self { env })
    }

    /// Render the template and inject the favicon link and chunk scripts.
    pub fn render(
        &self,
        config: &BuildConfig,
        manifest: &Manifest,
        favicon: bool,
    ) -> Result<String, minijinja::Error> {
        let template = self.env.get_template(TEMPLATE_NAME)?;
        let html = template.render(context! {
            assets_prefix => &config.assets_prefix,
            public_path => &config.public_path,
            base_path => &config.base_path,
            mode => config.mode.as_str(),
            node_env => config.mode.node_env(),
            title => &config.title,
        })?;

        let mut tags = Vec::new();
        if favicon {
            tags.push(format!(
                r#"<link rel="icon" href="{}favicon.ico">"#,
                config.public_path
            ));
        }
        for file in manifest.files() {
            tags.push(format!(
                r#"<script defer src="{}{}"></script>"#,
                config.public_path, file
            ));
        }

        Ok(inject_head(&html, &tags))
    }
}

/// Insert `tags` right before `</head>`, or append them when there is none.
pub fn inject_head(html: &str, tags: &[String]) -> String {
    if tags.is_empty() {
        return html.to_string();
    }

    let mut block = String::new();
    for tag in tags {
        block.push_str("  ");
        block.push_str(tag);
        block.push('\n');
    }

    match html.to_ascii_lowercase().find("</head>") {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + block.len());
            out.push_str(&html[..pos]);
            out.push_str(&block);
            out.push_str(&html[pos..]);
            out
        }
        None => {
            let mut out = html.to_string();
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str(&block);
            out
        }
    }
}
