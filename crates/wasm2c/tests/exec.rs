//! Execution tests: the emitted C is compiled with the host `cc` and
//! run, asserting on real program output rather than on the C text.
//!
//! If no `cc` is on PATH, build.rs leaves the `have_cc` cfg unset (with
//! a cargo warning) and this whole file compiles away.

#![cfg(have_cc)]

use anyhow::{bail, Context, Result};
use std::fs;
use std::process::Command;
use wasm2c::{transpile, TranspileOptions};

/// Transpile the module, append a C driver `main`, compile the single
/// translation unit with `cc` and return the program's stdout.
fn run_c(wat_source: &str, driver: &str) -> Result<String> {
    let wasm_bytes = wat::parse_str(wat_source).context("failed to parse WAT")?;
    let c_code = transpile(&wasm_bytes, &TranspileOptions::default())?;

    let dir = tempfile::tempdir().context("creating temp dir")?;
    let src = dir.path().join("module.c");
    fs::write(&src, format!("{c_code}\n#include <stdio.h>\n\n{driver}\n"))
        .context("writing C source")?;
    let exe = dir.path().join("module");

    let cc = Command::new("cc")
        .arg("-O1")
        .arg("-fno-strict-aliasing")
        .arg("-o")
        .arg(&exe)
        .arg(&src)
        .arg("-lm")
        .output()
        .context("running cc")?;
    if !cc.status.success() {
        bail!("cc failed:\n{}", String::from_utf8_lossy(&cc.stderr));
    }

    let run = Command::new(&exe).output().context("running compiled module")?;
    if !run.status.success() {
        bail!("compiled module exited with {}", run.status);
    }
    String::from_utf8(run.stdout).context("module output is not UTF-8")
}

#[test]
fn test_add_executes() -> Result<()> {
    let wat = r#"
        (module
            (func (export "add") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add
            )
        )
    "#;
    let driver = r#"
int main(void) {
    printf("%u\n", wasm_add(2, 3));
    printf("%u\n", wasm_add(4294967295u, 1));
    return 0;
}
"#;

    assert_eq!(run_c(wat, driver)?, "5\n0\n");
    Ok(())
}

#[test]
fn test_mutable_global_increments() -> Result<()> {
    let wat = r#"
        (module
            (global $g (mut i32) (i32.const 42))
            (func (export "get") (result i32)
                global.get $g
            )
            (func (export "inc")
                global.get $g
                i32.const 1
                i32.add
                global.set $g
            )
        )
    "#;
    let driver = r#"
int main(void) {
    printf("%u\n", wasm_get());
    wasm_inc();
    printf("%u\n", wasm_get());
    return 0;
}
"#;

    assert_eq!(run_c(wat, driver)?, "42\n43\n");
    Ok(())
}

#[test]
fn test_loop_runs_five_times() -> Result<()> {
    let wat = r#"
        (module
            (func (export "count") (result i32)
                (local $n i32)
                (loop $again
                    local.get $n
                    i32.const 1
                    i32.add
                    local.set $n
                    local.get $n
                    i32.const 5
                    i32.lt_u
                    br_if $again
                )
                local.get $n
            )
        )
    "#;
    let driver = r#"
int main(void) {
    printf("%u\n", wasm_count());
    return 0;
}
"#;

    assert_eq!(run_c(wat, driver)?, "5\n");
    Ok(())
}

#[test]
fn test_memory_grow_returns_old_page_count() -> Result<()> {
    let wat = r#"
        (module
            (memory 0)
            (func (export "grow_one") (result i32)
                i32.const 1
                memory.grow
            )
            (func (export "pages") (result i32)
                memory.size
            )
        )
    "#;
    let driver = r#"
int main(void) {
    printf("%u\n", wasm_grow_one());
    printf("%u\n", wasm_grow_one());
    printf("%u\n", wasm_pages());
    return 0;
}
"#;

    assert_eq!(run_c(wat, driver)?, "0\n1\n2\n");
    Ok(())
}

#[test]
fn test_br_table_out_of_range_hits_default() -> Result<()> {
    let wat = r#"
        (module
            (func (export "route") (param i32) (result i32)
                (block $outer
                    (block $inner
                        local.get 0
                        br_table $outer $inner
                    )
                    (return (i32.const 10))
                )
                i32.const 20
            )
        )
    "#;
    let driver = r#"
int main(void) {
    printf("%u\n", wasm_route(0));
    printf("%u\n", wasm_route(1));
    printf("%u\n", wasm_route(99));
    return 0;
}
"#;

    // Selector 0 takes the listed target; everything else, including a
    // selector far past the table, lands on the default.
    assert_eq!(run_c(wat, driver)?, "20\n10\n10\n");
    Ok(())
}

#[test]
fn test_float_min_max_propagate_nan() -> Result<()> {
    let wat = r#"
        (module
            (func (export "minf") (param f32 f32) (result f32)
                local.get 0
                local.get 1
                f32.min
            )
            (func (export "maxf") (param f32 f32) (result f32)
                local.get 0
                local.get 1
                f32.max
            )
        )
    "#;
    let driver = r#"
int main(void) {
    float lo = wasm_minf(NAN, 1.0f);
    printf("%d\n", lo != lo);
    printf("%g\n", wasm_minf(1.0f, 2.0f));
    float hi = wasm_maxf(1.0f, NAN);
    printf("%d\n", hi != hi);
    printf("%g\n", wasm_maxf(1.0f, 2.0f));
    return 0;
}
"#;

    assert_eq!(run_c(wat, driver)?, "1\n1\n1\n2\n");
    Ok(())
}
