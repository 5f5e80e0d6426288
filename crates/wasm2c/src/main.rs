use anyhow::{Context, Result};
use clap::Parser;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::PathBuf;
use wasm2c::{transpile, transpile_compressed, TranspileOptions};

/// wasm2c — ahead-of-time WebAssembly to C transpiler for bootstrap builds.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Input zstd-compressed WebAssembly binary (.wasm.zst)
    input: PathBuf,

    /// Output C source file (stdout when omitted)
    output: Option<PathBuf>,

    /// Treat the input as an uncompressed .wasm binary
    #[arg(long)]
    raw: bool,

    /// Prefix for exported C symbols
    #[arg(long, default_value = "wasm")]
    export_prefix: String,

    /// Emit byte-by-byte memory accesses for big-endian targets
    #[arg(long)]
    big_endian: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    eprintln!("wasm2c: transpiling {}", cli.input.display());

    let options = TranspileOptions {
        export_prefix: cli.export_prefix.clone(),
        big_endian_target: cli.big_endian,
    };

    let c_code = if cli.raw {
        let wasm_bytes = fs::read(&cli.input)
            .with_context(|| format!("failed to read {}", cli.input.display()))?;
        transpile(&wasm_bytes, &options)
    } else {
        let file = File::open(&cli.input)
            .with_context(|| format!("failed to open {}", cli.input.display()))?;
        transpile_compressed(BufReader::new(file), &options)
    }
    .context("transpilation failed")?;

    if let Some(output_path) = cli.output {
        fs::write(&output_path, &c_code)
            .with_context(|| format!("failed to write {}", output_path.display()))?;
        eprintln!("wasm2c: wrote {}", output_path.display());
    } else {
        print!("{}", c_code);
    }

    eprintln!("wasm2c: transpilation complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_defaults() {
        let cli = Cli::parse_from(["wasm2c", "input.wasm.zst"]);
        assert_eq!(cli.input, PathBuf::from("input.wasm.zst"));
        assert!(cli.output.is_none());
        assert!(!cli.raw);
        assert_eq!(cli.export_prefix, "wasm");
        assert!(!cli.big_endian);
    }

    #[test]
    fn cli_parses_flags() {
        let cli = Cli::parse_from([
            "wasm2c",
            "mod.wasm",
            "mod.c",
            "--raw",
            "--export-prefix",
            "stage1",
        ]);
        assert!(cli.raw);
        assert_eq!(cli.export_prefix, "stage1");
        assert_eq!(cli.output, Some(PathBuf::from("mod.c")));
    }
}
