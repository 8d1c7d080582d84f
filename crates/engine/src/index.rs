// SPDX-License-Identifier: MIT

//! In-memory application index: services and exported commands of every
//! loaded pack. Populated by load, cleared by unload, rebuilt by the
//! restoration mount pass.

use chef_core::{PackManifest, PackRef};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct AppIndex {
    apps: HashMap<(String, String), PackManifest>,
}

impl AppIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(pack: &PackRef) -> (String, String) {
        (pack.publisher.clone(), pack.package.clone())
    }

    pub fn insert(&mut self, manifest: PackManifest) {
        self.apps.insert(Self::key(&manifest.pack), manifest);
    }

    pub fn remove(&mut self, pack: &PackRef) -> Option<PackManifest> {
        self.apps.remove(&Self::key(pack))
    }

    pub fn get(&self, pack: &PackRef) -> Option<&PackManifest> {
        self.apps.get(&Self::key(pack))
    }

    pub fn contains(&self, pack: &PackRef) -> bool {
        self.apps.contains_key(&Self::key(pack))
    }

    pub fn len(&self) -> usize {
        self.apps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apps.is_empty()
    }
}
