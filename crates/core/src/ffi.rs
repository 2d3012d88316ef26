//! C FFI bindings
//!
//! All buffers are fixed width: header hashes, seeds, mix digests and
//! results are 32 bytes. Outputs are always copied into caller-owned memory.

use core::slice;

use crate::difficulty;
use crate::epoch::seed_hash;
use crate::light::Light;
use crate::params::{H256_BYTES, Params};
use crate::primitives::H256;

/// Opaque light handle for FFI
pub struct KrashLight {
    inner: Light,
}

/// Create a light handle for `block_number` with production parameters
/// Returns null on failure (caller must free with krash_light_delete)
#[unsafe(no_mangle)]
pub extern "C" fn krash_light_new(block_number: u64) -> *mut KrashLight {
    match Light::new(block_number) {
        Ok(inner) => Box::into_raw(Box::new(KrashLight { inner })),
        Err(_) => core::ptr::null_mut(),
    }
}

/// Create a light handle from explicit sizes and a 32-byte seed
/// Returns null on invalid sizes or a null seed
#[unsafe(no_mangle)]
pub extern "C" fn krash_light_new_internal(
    cache_size: u64,
    full_size: u64,
    seed: *const u8,
) -> *mut KrashLight {
    if seed.is_null() {
        return core::ptr::null_mut();
    }
    let seed = unsafe { slice::from_raw_parts(seed, H256_BYTES) };
    match Light::from_parts(seed, cache_size, full_size, Params::default()) {
        Ok(inner) => Box::into_raw(Box::new(KrashLight { inner })),
        Err(_) => core::ptr::null_mut(),
    }
}

/// Free a light handle
#[unsafe(no_mangle)]
pub extern "C" fn krash_light_delete(light: *mut KrashLight) {
    if !light.is_null() {
        unsafe {
            let _ = Box::from_raw(light);
        }
    }
}

/// Compute mix digest and result for a 32-byte header hash
/// - mix_out, result_out: 32-byte buffers
///
/// Returns false if any pointer is null or the computation failed.
#[unsafe(no_mangle)]
pub extern "C" fn krash_light_compute(
    light: *const KrashLight,
    header_hash: *const u8,
    nonce: u64,
    mix_out: *mut u8,
    result_out: *mut u8,
) -> bool {
    if light.is_null() || header_hash.is_null() || mix_out.is_null() || result_out.is_null() {
        return false;
    }

    unsafe {
        let light = &*light;
        let header = slice::from_raw_parts(header_hash, H256_BYTES);
        let Ok(pow) = light.inner.compute(header, nonce) else {
            return false;
        };
        slice::from_raw_parts_mut(mix_out, H256_BYTES).copy_from_slice(&pow.mix_digest);
        slice::from_raw_parts_mut(result_out, H256_BYTES).copy_from_slice(&pow.result);
    }
    true
}

/// Write the 32-byte seed hash for `block_number` into `out`
#[unsafe(no_mangle)]
pub extern "C" fn krash_get_seedhash(block_number: u64, out: *mut u8) {
    if out.is_null() {
        return;
    }
    let seed = seed_hash(block_number, &Params::default());
    unsafe {
        slice::from_raw_parts_mut(out, H256_BYTES).copy_from_slice(&seed);
    }
}

/// Check a claimed mix digest against a boundary without any cache
#[unsafe(no_mangle)]
pub extern "C" fn krash_quick_check_difficulty(
    header_hash: *const u8,
    nonce: u64,
    mix_digest: *const u8,
    boundary: *const u8,
) -> bool {
    if header_hash.is_null() || mix_digest.is_null() || boundary.is_null() {
        return false;
    }
    unsafe {
        difficulty::quick_check_difficulty(
            &read_h256(header_hash),
            nonce,
            &read_h256(mix_digest),
            &read_h256(boundary),
        )
    }
}

unsafe fn read_h256(ptr: *const u8) -> H256 {
    let mut out = [0u8; H256_BYTES];
    out.copy_from_slice(unsafe { slice::from_raw_parts(ptr, H256_BYTES) });
    out
}
