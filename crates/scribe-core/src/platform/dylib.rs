//! Native dynamic library boundary.
//!
//! Every `unsafe` call into the dynamic loader lives here so the rest of the
//! crate can stay under the workspace `unsafe_code = "deny"` lint.

#![allow(unsafe_code)]

use libloading::Library;
use std::path::{Path, PathBuf};

/// A native library mapped into the current process.
///
/// The library stays mapped until the value is dropped.
#[derive(Debug)]
pub struct NativeLibrary {
    path: PathBuf,
    library: Library,
}

impl NativeLibrary {
    /// Map the library at `path` into the process.
    ///
    /// # Platform Behavior
    /// - **Linux/macOS**: `dlopen` with `RTLD_NOW | RTLD_GLOBAL`, so symbols of
    ///   libraries loaded here satisfy dependencies of libraries loaded later
    /// - **Windows**: `LoadLibraryExW` with default flags. A missing dependency
    ///   fails with os error 126, which does not name the library, so the
    ///   dependency resolution fallback cannot act on it
    pub fn open(path: &Path) -> Result<Self, libloading::Error> {
        #[cfg(unix)]
        let library: Library = {
            use libloading::os::unix::{Library as UnixLibrary, RTLD_GLOBAL, RTLD_NOW};
            // SAFETY: loading runs the library's initializers. Add-ins are
            // trusted code installed next to the application or in the
            // user's add-ins folder, and loads happen one at a time.
            unsafe { UnixLibrary::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }?.into()
        };

        #[cfg(not(unix))]
        // SAFETY: same contract as above; DllMain runs under the loader lock.
        let library = unsafe { Library::new(path) }?;

        Ok(Self {
            path: path.to_path_buf(),
            library,
        })
    }

    /// Path the library was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the library exports `symbol` (NUL-terminated).
    pub fn has_symbol(&self, symbol: &[u8]) -> bool {
        // SAFETY: only the symbol address is looked up; it is neither called
        // nor dereferenced.
        unsafe { self.library.get::<*const ()>(symbol) }.is_ok()
    }

    /// Call an exported `extern "C" fn() -> i32`.
    ///
    /// Returns `None` when the library does not export `symbol`.
    pub fn call_status_fn(&self, symbol: &[u8]) -> Option<i32> {
        // SAFETY: the add-in ABI declares hook symbols as
        // `extern "C" fn() -> i32`. The symbol cannot outlive `self.library`
        // because it is dropped at the end of this function.
        let hook = unsafe { self.library.get::<unsafe extern "C" fn() -> i32>(symbol) }.ok()?;
        // SAFETY: see above; the hook takes no arguments.
        Some(unsafe { (*hook)() })
    }
}
