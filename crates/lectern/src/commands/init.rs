//! Scaffold a site project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Files written by `init`, relative to the project root.
const FILES: &[(&str, &str)] = &[
    ("lectern.toml", DEFAULT_CONFIG),
    ("src/index.html", DEFAULT_TEMPLATE),
    ("src/js/main.jsx", DEFAULT_ENTRY),
    ("src/css/main.css", DEFAULT_CSS),
    ("docs/index.md", DEFAULT_INDEX),
    ("docs/getting-started.md", DEFAULT_GETTING_STARTED),
];

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing lectern...");

    let written = scaffold(Path::new("."), yes)?;
    if written == 0 {
        tracing::warn!("Project already initialized. Use --yes to overwrite.");
        return Ok(());
    }

    tracing::info!("Initialization complete!");
    tracing::info!("Install react and react-dom into node_modules, then run 'lectern dev'.");

    Ok(())
}

/// Write the project files under `root`. Existing files are kept unless
/// `overwrite` is set. Returns the number of files written.
pub fn scaffold(root: &Path, overwrite: bool) -> Result<usize> {
    let mut written = 0;

    for (relative, content) in FILES {
        let path = root.join(relative);
        if path.exists() && !overwrite {
            tracing::debug!("Keeping {}", relative);
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed to write {}", relative))?;
        tracing::info!("Created {}", relative);
        written += 1;
    }

    Ok(written)
}

const DEFAULT_CONFIG: &str = r#"# lectern configuration

[site]
title = "My Documentation"

# Production builds are served from /<base_path>/
base_path = "crizmas-mvc-docs"

entry = "src/js/main.jsx"
template = "src/index.html"
favicon = "src/img/favicon.ico"
output = "dist"

[content]
dir = "docs"

[transform]
# JSX is compiled for modules under include_dir matching include
include_dir = "src"
include = '\.jsx?$'

[bundle]
# Modules matching these patterns are dropped from production builds when unused
side_effect_free = ["crizmas-"]
vendor_chunk = true

[assets]
copy = [{ from = "src/css", to = "css" }]

[server]
port = 5555
"#;

const DEFAULT_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width, initial-scale=1">
  <title>{{ title }}</title>
  {% if mode != "development" %}<link rel="stylesheet" href="{{ assets_prefix }}/css/main.css">{% endif %}
</head>
<body>
  <div id="app"></div>
</body>
</html>
"#;

const DEFAULT_ENTRY: &str = r#"import React from 'react';
import ReactDOM from 'react-dom';
import { pages, nav } from 'lectern:pages';

const base = process.env.basePath ? '/' + process.env.basePath : '';

function Inline({ nodes }) {
  return nodes.map((node, i) => {
    switch (node.type) {
      case 'text':
        return node.text;
      case 'code':
        return <code key={i}>{node.text}</code>;
      case 'strong':
        return <strong key={i}><Inline nodes={node.content} /></strong>;
      case 'emphasis':
        return <em key={i}><Inline nodes={node.content} /></em>;
      case 'link':
        return <a key={i} href={node.href}><Inline nodes={node.content} /></a>;
      default:
        return null;
    }
  });
}

function Block({ block }) {
  switch (block.type) {
    case 'heading':
      return React.createElement('h' + block.level, { id: block.id }, <Inline nodes={block.content} />);
    case 'paragraph':
      return <p><Inline nodes={block.content} /></p>;
    case 'code':
      return <pre><code>{block.text}</code></pre>;
    case 'list':
      return <ul>{block.items.map((item, i) => <li key={i}>{item.map((b, j) => <Block key={j} block={b} />)}</li>)}</ul>;
    default:
      return null;
  }
}

function Nav({ items }) {
  return <ul>
    {items.map((item) => <li key={item.path}>
      <a href={base + item.path}>{item.title}</a>
      {item.children ? <Nav items={item.children} /> : null}
    </li>)}
  </ul>;
}

function App() {
  const path = location.pathname.slice(base.length) || '/';
  const page = pages.find((p) => p.route === path) || pages[0];
  return <div className="layout">
    <nav><Nav items={nav} /></nav>
    <main>{page ? page.blocks.map((block, i) => <Block key={i} block={block} />) : null}</main>
  </div>;
}

ReactDOM.render(<App />, document.getElementById('app'));
"#;

const DEFAULT_CSS: &str = r#"body {
  margin: 0;
  font-family: system-ui, sans-serif;
}

.layout {
  display: flex;
}

.layout nav {
  width: 16rem;
}

pre {
  padding: 1rem;
  overflow-x: auto;
}
"#;

const DEFAULT_INDEX: &str = r#"---
title: Welcome
order: 1
---

# Welcome to Your Documentation

This is your documentation site, built with **lectern**.

Check out the [Getting Started](/getting-started) guide.
"#;

const DEFAULT_GETTING_STARTED: &str = r#"---
title: Getting Started
order: 2
---

# Getting Started

## Project Structure

```
your-project/
├── docs/              # Documentation pages
├── src/
│   ├── index.html     # Page template
│   ├── js/main.jsx    # Entry module
│   └── css/           # Stylesheets
└── lectern.toml       # Configuration
```

## Writing Pages

Create `.md` files in the `docs/` directory. Frontmatter is optional:

```md
---
title: Page Title
order: 3
---
```

## Development

```bash
lectern dev
```

## Building

```bash
LECTERN_MODE=production lectern build
```
"#;
