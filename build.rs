// SPDX-License-Identifier: Apache-2.0 OR MIT
fn main() {
    // Coverage runs (`cargo tarpaulin`) set `cfg(tarpaulin)`; tests that fork
    // or abort the process are ignored under it. Declare the cfg so normal
    // builds don't warn about an unexpected cfg name.
    println!("cargo:rustc-check-cfg=cfg(tarpaulin)");
}
