//! Common utilities for frame loop tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use vireo_graphics::{GraphicsDevice, Material};

/// A SPIR-V module header: magic, version 1.0, generator, bound, schema.
const SPIRV_HEADER: [u32; 5] = [0x0723_0203, 0x0001_0000, 0, 1, 0];

/// A temporary directory with placeholder default shaders, removed on drop.
pub struct ShaderDir {
    path: PathBuf,
}

impl ShaderDir {
    pub fn diffuse() -> Self {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let path = std::env::temp_dir().join(format!(
            "vireo-app-tests-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        std::fs::create_dir_all(&path).expect("Failed to create shader dir");

        let bytes: Vec<u8> = SPIRV_HEADER.iter().flat_map(|w| w.to_le_bytes()).collect();
        for name in [Material::DEFAULT_VERTEX_SHADER, Material::DEFAULT_FRAGMENT_SHADER] {
            std::fs::write(path.join(name), &bytes).expect("Failed to write shader");
        }
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ShaderDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}

pub fn dummy_device() -> Arc<GraphicsDevice> {
    let _ = env_logger::builder().is_test(true).try_init();
    Arc::new(GraphicsDevice::dummy())
}
