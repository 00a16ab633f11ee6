// Artifact writer
// Renders the emission context into main.cpp, defines.h and a PlatformIO
// project file. Existing files keep everything outside the generated
// markers; a file is only rewritten when its content changes.

use crate::codegen::EmissionContext;
use crate::config::CodegenConfig;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CPP_CODE_BEGIN: &str = "// ========== AUTO GENERATED CODE BEGIN ===========";
pub const CPP_CODE_END: &str = "// =========== AUTO GENERATED CODE END ============";
pub const CPP_INCLUDE_BEGIN: &str = "// ========== AUTO GENERATED INCLUDE BLOCK BEGIN ===========";
pub const CPP_INCLUDE_END: &str = "// ========== AUTO GENERATED INCLUDE BLOCK END ===========";
pub const INI_CODE_BEGIN: &str = "; ========== AUTO GENERATED CODE BEGIN ===========";
pub const INI_CODE_END: &str = "; =========== AUTO GENERATED CODE END ============";

const CORE_INCLUDES: &str = "#include \"esphome.h\"\nusing namespace esphome;\n";
const CPP_HEADER: &str = "// Auto generated code by fwgen\n";
const CPP_BEFORE_SETUP: &str = "\n\nvoid setup() {\n  // ===== DO NOT EDIT ANYTHING BELOW THIS LINE =====\n";
const CPP_AFTER_SETUP: &str = "\n  // ========= YOU CAN EDIT AFTER THIS LINE =========\n  App.setup();\n}\n\nvoid loop() {\n  App.loop();\n}\n";
const INI_HEADER: &str = "; Auto generated code by fwgen\n\n; ===== DO NOT EDIT ANYTHING BELOW THIS LINE =====\n";
const INI_FOOTER: &str = "\n; ========= YOU CAN EDIT AFTER THIS LINE =========\n\n";

#[derive(Error, Debug)]
pub enum WriteError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("could not find marker '{marker}' in {path}; delete the file or insert the marker again")]
    MissingMarker { path: PathBuf, marker: &'static str },

    #[error("found marker '{marker}' more than once in {path}; remove all but one")]
    DuplicateMarker { path: PathBuf, marker: &'static str },

    #[error("marker '{end}' comes before '{begin}' in {path}")]
    MisorderedMarkers {
        path: PathBuf,
        begin: &'static str,
        end: &'static str,
    },
}

/// Text before the begin marker and after the end marker
pub fn find_begin_end<'a>(
    text: &'a str,
    begin: &'static str,
    end: &'static str,
    path: &Path,
) -> Result<(&'a str, &'a str), WriteError> {
    let locate = |marker: &'static str| -> Result<usize, WriteError> {
        let index = text.find(marker).ok_or_else(|| WriteError::MissingMarker {
            path: path.to_path_buf(),
            marker,
        })?;
        if text[index + marker.len()..].contains(marker) {
            return Err(WriteError::DuplicateMarker {
                path: path.to_path_buf(),
                marker,
            });
        }
        Ok(index)
    };

    let begin_index = locate(begin)?;
    let end_index = locate(end)?;
    if end_index < begin_index {
        return Err(WriteError::MisorderedMarkers {
            path: path.to_path_buf(),
            begin,
            end,
        });
    }
    Ok((&text[..begin_index], &text[end_index + end.len()..]))
}

/// Include block: the core header, requested includes, then the global
/// declarations
pub fn render_includes(ctx: &EmissionContext) -> String {
    let mut out = String::from(CORE_INCLUDES);
    for header in ctx.includes().filter(|h| *h != "esphome.h") {
        if header.starts_with('<') || header.starts_with('"') {
            out.push_str(&format!("#include {}\n", header));
        } else {
            out.push_str(&format!("#include \"{}\"\n", header));
        }
    }
    if !ctx.globals().is_empty() {
        out.push('\n');
        for global in ctx.globals() {
            out.push_str(global);
            out.push('\n');
        }
    }
    out
}

/// Setup body, one statement per line; lines inside a statement keep their
/// relative indentation
pub fn render_setup(ctx: &EmissionContext, indent: usize) -> String {
    let pad = " ".repeat(indent);
    let mut out = String::new();
    for statement in ctx.statements() {
        for line in statement.text.lines() {
            if !line.is_empty() {
                out.push_str(&pad);
            }
            out.push_str(line);
            out.push('\n');
        }
    }
    out
}

pub fn render_defines(ctx: &EmissionContext) -> String {
    let mut out = String::from("#pragma once\n");
    if !ctx.defines().is_empty() {
        out.push('\n');
    }
    for (name, value) in ctx.defines() {
        match value {
            Some(value) => out.push_str(&format!("#define {} {}\n", name, value)),
            None => out.push_str(&format!("#define {}\n", name)),
        }
    }
    out
}

/// PlatformIO environment section, keys sorted
pub fn render_platformio(ctx: &EmissionContext) -> String {
    let mut out = format!("[env:{}]\n", ctx.environment());
    let lib_deps = ctx.lib_deps();
    let mut entries: Vec<(&str, Option<&str>)> = ctx
        .platformio_options()
        .iter()
        .map(|(k, v)| (k.as_str(), Some(v.as_str())))
        .collect();
    if !lib_deps.is_empty() {
        entries.push(("lib_deps", None));
    }
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (key, value) in entries {
        match value {
            Some(value) => out.push_str(&format!("{} = {}\n", key, value)),
            None => {
                out.push_str(&format!("{} =\n", key));
                for dep in &lib_deps {
                    out.push_str(&format!("    {}\n", dep));
                }
            }
        }
    }
    out
}

/// Full main.cpp text, spliced into `existing` when given
pub fn render_main(
    ctx: &EmissionContext,
    indent: usize,
    existing: Option<&str>,
    path: &Path,
) -> Result<String, WriteError> {
    let pad = " ".repeat(indent);
    let (head, middle, tail) = match existing {
        Some(text) => {
            let (before, after) = find_begin_end(text, CPP_CODE_BEGIN, CPP_CODE_END, path)?;
            let (head, middle) = find_begin_end(before, CPP_INCLUDE_BEGIN, CPP_INCLUDE_END, path)?;
            (head, middle.to_string(), after)
        }
        None => (CPP_HEADER, format!("{}{}", CPP_BEFORE_SETUP, pad), CPP_AFTER_SETUP),
    };

    let mut out = String::with_capacity(head.len() + middle.len() + tail.len() + 256);
    out.push_str(head);
    out.push_str(CPP_INCLUDE_BEGIN);
    out.push('\n');
    out.push_str(&render_includes(ctx));
    out.push_str(CPP_INCLUDE_END);
    out.push_str(&middle);
    out.push_str(CPP_CODE_BEGIN);
    out.push('\n');
    out.push_str(&render_setup(ctx, indent));
    out.push_str(&pad);
    out.push_str(CPP_CODE_END);
    out.push_str(tail);
    Ok(out)
}

/// Full platformio.ini text, spliced into `existing` when given
pub fn render_ini(ctx: &EmissionContext, existing: Option<&str>, path: &Path) -> Result<String, WriteError> {
    let (head, tail) = match existing {
        Some(text) => find_begin_end(text, INI_CODE_BEGIN, INI_CODE_END, path)?,
        None => (INI_HEADER, INI_FOOTER),
    };
    Ok(format!(
        "{}{}\n{}{}{}",
        head,
        INI_CODE_BEGIN,
        render_platformio(ctx),
        INI_CODE_END,
        tail
    ))
}

fn read_existing(path: &Path) -> Result<Option<String>, WriteError> {
    if !path.is_file() {
        return Ok(None);
    }
    fs::read_to_string(path)
        .map(Some)
        .map_err(|source| WriteError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Write `content` unless the file already holds it; true when written
fn write_if_changed(path: &Path, previous: Option<&str>, content: &str) -> Result<bool, WriteError> {
    if previous == Some(content) {
        debug!("{} is up to date", path.display());
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| WriteError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| WriteError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    debug!("wrote {}", path.display());
    Ok(true)
}

/// Write all artifacts under `config.output_dir`; returns the files that changed
pub fn write(ctx: &EmissionContext, config: &CodegenConfig) -> Result<Vec<PathBuf>, WriteError> {
    let mut changed = Vec::new();

    let main_path = config.main_path();
    let previous = read_existing(&main_path)?;
    let main = render_main(ctx, config.indent, previous.as_deref(), &main_path)?;
    if write_if_changed(&main_path, previous.as_deref(), &main)? {
        changed.push(main_path);
    }

    let defines_path = config.defines_path();
    let previous = read_existing(&defines_path)?;
    if write_if_changed(&defines_path, previous.as_deref(), &render_defines(ctx))? {
        changed.push(defines_path);
    }

    let ini_path = config.libraries_path();
    let previous = read_existing(&ini_path)?;
    let ini = render_ini(ctx, previous.as_deref(), &ini_path)?;
    if write_if_changed(&ini_path, previous.as_deref(), &ini)? {
        changed.push(ini_path);
    }

    info!(
        "{} artifact(s) updated in {}",
        changed.len(),
        config.output_dir.display()
    );
    Ok(changed)
}
