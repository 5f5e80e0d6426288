//! The fixed prologue of every generated translation unit.
//!
//! The output is freestanding C depending only on `<math.h>`,
//! `<stdint.h>`, `<stdlib.h>` and `<string.h>`. Bit reinterpretation goes
//! through `memcpy`-based helpers (not pointer aliasing) to stay defined
//! behavior; `fmin`/`fmax` are wrapped because the C library versions do
//! not propagate NaN the way WebAssembly requires.

pub const C_PROLOGUE: &str = r#"#include <math.h>
#include <stdint.h>
#include <stdlib.h>
#include <string.h>

static void init(void);

static uint32_t i32_reinterpret_f32(float x) { uint32_t r; memcpy(&r, &x, sizeof(r)); return r; }
static float f32_reinterpret_i32(uint32_t x) { float r; memcpy(&r, &x, sizeof(r)); return r; }
static uint64_t i64_reinterpret_f64(double x) { uint64_t r; memcpy(&r, &x, sizeof(r)); return r; }
static double f64_reinterpret_i64(uint64_t x) { double r; memcpy(&r, &x, sizeof(r)); return r; }

static uint32_t i32_clz(uint32_t x) {
    uint32_t n = 0;
    if (x == 0) return 32;
    while (!(x & UINT32_C(0x80000000))) { x <<= 1; n += 1; }
    return n;
}
static uint32_t i32_ctz(uint32_t x) {
    uint32_t n = 0;
    if (x == 0) return 32;
    while (!(x & UINT32_C(1))) { x >>= 1; n += 1; }
    return n;
}
static uint32_t i32_popcnt(uint32_t x) {
    uint32_t n = 0;
    while (x != 0) { n += x & UINT32_C(1); x >>= 1; }
    return n;
}
static uint64_t i64_clz(uint64_t x) {
    uint64_t n = 0;
    if (x == 0) return 64;
    while (!(x & UINT64_C(0x8000000000000000))) { x <<= 1; n += 1; }
    return n;
}
static uint64_t i64_ctz(uint64_t x) {
    uint64_t n = 0;
    if (x == 0) return 64;
    while (!(x & UINT64_C(1))) { x >>= 1; n += 1; }
    return n;
}
static uint64_t i64_popcnt(uint64_t x) {
    uint64_t n = 0;
    while (x != 0) { n += x & UINT64_C(1); x >>= 1; }
    return n;
}

static float f32_min(float a, float b) { return (a != a || b != b) ? (float)NAN : fminf(a, b); }
static float f32_max(float a, float b) { return (a != a || b != b) ? (float)NAN : fmaxf(a, b); }
static double f64_min(double a, double b) { return (a != a || b != b) ? (double)NAN : fmin(a, b); }
static double f64_max(double a, double b) { return (a != a || b != b) ? (double)NAN : fmax(a, b); }

static uint32_t memory_grow(uint8_t **mem, uint32_t *pages, uint32_t delta) {
    uint32_t old_pages = *pages;
    uint64_t new_pages = (uint64_t)old_pages + (uint64_t)delta;
    uint8_t *new_mem;
    if (new_pages > UINT64_C(65536)) return UINT32_C(0xffffffff);
    new_mem = realloc(*mem, new_pages * UINT64_C(65536));
    if (new_mem == NULL && new_pages != 0) return UINT32_C(0xffffffff);
    memset(new_mem + (uint64_t)old_pages * UINT64_C(65536), 0, (uint64_t)delta * UINT64_C(65536));
    *mem = new_mem;
    *pages = (uint32_t)new_pages;
    return old_pages;
}

"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prologue_is_freestanding() {
        for include in ["<math.h>", "<stdint.h>", "<stdlib.h>", "<string.h>"] {
            assert!(C_PROLOGUE.contains(include));
        }
        assert!(!C_PROLOGUE.contains("<stdio.h>"));
    }

    #[test]
    fn grow_failure_uses_wasm_sentinel() {
        // -1 per the wasm spec, not the truncated 0x0fffffff of older
        // generators.
        assert!(C_PROLOGUE.contains("UINT32_C(0xffffffff)"));
        assert!(!C_PROLOGUE.contains("0xfffffff)"));
    }

    #[test]
    fn min_max_propagate_nan() {
        assert!(C_PROLOGUE.contains("a != a || b != b"));
    }
}
