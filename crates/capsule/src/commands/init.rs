//! Initialize a capsule project.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

/// Run the init command.
pub async fn run(yes: bool) -> Result<()> {
    tracing::info!("Initializing capsule...");

    write_file(Path::new("capsule.toml"), DEFAULT_CONFIG, yes)?;
    write_file(Path::new("page.tsx"), DEFAULT_PAGE, yes)?;

    tracing::info!("Initialization complete!");
    tracing::info!("Run 'capsule dev' to start the preview server.");

    Ok(())
}

fn write_file(path: &Path, content: &str, overwrite: bool) -> Result<()> {
    if path.exists() && !overwrite {
        tracing::warn!("{} already exists. Use --yes to overwrite.", path.display());
        return Ok(());
    }

    fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Created {}", path.display());
    Ok(())
}

pub(crate) const DEFAULT_CONFIG: &str = r#"# Capsule Configuration

[preview]
host = "127.0.0.1"
port = 7878
open = true
# Injected into the preview frame; set to "" to disable
tailwind_cdn = "https://cdn.tailwindcss.com"
# assets_dir = "public"

[source]
# Component file rendered by `capsule dev`
path = "page.tsx"

[sandbox]
# Budget for loading or rendering one component
timeout_ms = 2000
max_heap_mb = 128
capture_console = true

[transform]
# Filename reported in transform diagnostics
filename = "generated.tsx"
"#;

pub(crate) const DEFAULT_PAGE: &str = r#"import { motion } from "framer-motion";
import { ArrowRight, Sparkles } from "lucide-react";

const features = ["Instant preview", "Typed components", "Tailwind styling"];

export default function LandingPage() {
  return (
    <main className="min-h-screen bg-zinc-950 text-zinc-100">
      <section className="mx-auto max-w-3xl px-6 py-24 text-center">
        <motion.div
          initial={{ opacity: 0, y: 20 }}
          animate={{ opacity: 1, y: 0 }}
          className="inline-flex items-center gap-2 rounded-full border border-emerald-500/40 px-4 py-1 text-sm text-emerald-400"
        >
          <Sparkles className="h-4 w-4" />
          Built with capsule
        </motion.div>
        <h1 className="mt-6 text-5xl font-bold tracking-tight">Ship pages faster</h1>
        <ul className="mt-8 flex justify-center gap-6 text-zinc-400">
          {features.map((feature) => (
            <li key={feature}>{feature}</li>
          ))}
        </ul>
        <button className="mt-10 inline-flex items-center gap-2 rounded-lg bg-emerald-500 px-6 py-3 font-medium text-zinc-950">
          Get started <ArrowRight className="h-4 w-4" />
        </button>
      </section>
    </main>
  );
}
"#;
