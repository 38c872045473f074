//! Export a component as a standalone Vite + React + Tailwind project.

use std::fs::{self, File};
use std::io::{Seek, Write};
use std::path::Path;

use anyhow::{Context, Result};
use capsule_transform::SourceUnit;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Run the export command.
pub fn run(file: &Path, out: &Path) -> Result<()> {
    let raw = fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let source = SourceUnit::normalize(&raw);
    if source.is_empty() {
        anyhow::bail!("{} is empty", file.display());
    }

    let archive = File::create(out).with_context(|| format!("Failed to create {}", out.display()))?;
    write_project(archive, &source).context("Failed to write project archive")?;

    tracing::info!("Exported {} to {}", file.display(), out.display());
    Ok(())
}

/// Write the project scaffold with `source` as `src/App.tsx`.
pub fn write_project<W: Write + Seek>(writer: W, source: &SourceUnit) -> zip::result::ZipResult<W> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let app = format!("{}\n", source.as_str());
    let files: [(&str, &str); 8] = [
        ("package.json", PACKAGE_JSON),
        ("index.html", INDEX_HTML),
        ("vite.config.ts", VITE_CONFIG),
        ("tsconfig.json", TSCONFIG),
        ("src/main.tsx", MAIN_TSX),
        ("src/App.tsx", &app),
        ("src/index.css", INDEX_CSS),
        ("README.md", README),
    ];

    for (name, content) in files {
        zip.start_file(name, options)?;
        zip.write_all(content.as_bytes())?;
    }

    zip.finish()
}

const PACKAGE_JSON: &str = r#"{
  "name": "capsule-project",
  "private": true,
  "version": "0.0.0",
  "type": "module",
  "scripts": {
    "dev": "vite",
    "build": "tsc && vite build",
    "preview": "vite preview"
  },
  "dependencies": {
    "framer-motion": "^11.0.0",
    "lucide-react": "^0.400.0",
    "react": "^18.3.1",
    "react-dom": "^18.3.1"
  },
  "devDependencies": {
    "@types/react": "^18.3.3",
    "@types/react-dom": "^18.3.0",
    "@vitejs/plugin-react": "^4.3.1",
    "autoprefixer": "^10.4.19",
    "postcss": "^8.4.38",
    "tailwindcss": "^3.4.4",
    "typescript": "^5.5.3",
    "vite": "^5.3.4"
  }
}
"#;

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head>
    <meta charset="UTF-8" />
    <meta name="viewport" content="width=device-width, initial-scale=1.0" />
    <title>Capsule Project</title>
    <script src="https://cdn.tailwindcss.com"></script>
  </head>
  <body>
    <div id="root"></div>
    <script type="module" src="/src/main.tsx"></script>
  </body>
</html>
"#;

const VITE_CONFIG: &str = r#"import { defineConfig } from "vite";
import react from "@vitejs/plugin-react";

export default defineConfig({
  plugins: [react()],
});
"#;

const TSCONFIG: &str = r#"{
  "compilerOptions": {
    "target": "ES2020",
    "useDefineForClassFields": true,
    "lib": ["ES2020", "DOM", "DOM.Iterable"],
    "module": "ESNext",
    "skipLibCheck": true,
    "moduleResolution": "bundler",
    "allowImportingTsExtensions": true,
    "resolveJsonModule": true,
    "isolatedModules": true,
    "noEmit": true,
    "jsx": "react-jsx",
    "strict": true
  },
  "include": ["src"]
}
"#;

const MAIN_TSX: &str = r#"import React from "react";
import ReactDOM from "react-dom/client";
import App from "./App";
import "./index.css";

ReactDOM.createRoot(document.getElementById("root")!).render(
  <React.StrictMode>
    <App />
  </React.StrictMode>
);
"#;

const INDEX_CSS: &str = r#"@tailwind base;
@tailwind components;
@tailwind utilities;
"#;

const README: &str = r#"# Capsule Project

Exported from capsule.

```bash
npm install
npm run dev
```
"#;
