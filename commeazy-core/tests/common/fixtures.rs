// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Test Fixtures

use std::sync::Once;

use commeazy_core::{
    BackupCodec, CoreConfig, KdfParams, KeyManager, LinkedProfile, MemoryKeyStore, Recipient,
};

static TRACING: Once = Once::new();

/// Routes `tracing` output to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Config with cheap Argon2id parameters.
pub fn test_config() -> CoreConfig {
    CoreConfig::default().with_kdf(KdfParams::insecure_for_tests())
}

/// Backup codec with cheap Argon2id parameters.
pub fn test_codec() -> BackupCodec {
    BackupCodec::new(&test_config())
}

/// Key manager over an in-memory store with a freshly generated pair.
pub fn initialized_manager() -> KeyManager<MemoryKeyStore> {
    let mut keys = KeyManager::new(MemoryKeyStore::new());
    keys.generate_key_pair().expect("key generation");
    keys
}

/// A group member: id plus its own initialized key manager.
pub struct Member {
    pub id: String,
    pub keys: KeyManager<MemoryKeyStore>,
}

impl Member {
    pub fn new(id: impl Into<String>) -> Self {
        Member {
            id: id.into(),
            keys: initialized_manager(),
        }
    }

    pub fn recipient(&self) -> Recipient {
        Recipient::new(
            self.id.clone(),
            self.keys.get_public_key().expect("initialized").to_vec(),
        )
    }

    pub fn public_key(&self) -> [u8; 32] {
        self.keys.get_public_key().expect("initialized")
    }
}

/// `count` members named `member-0`, `member-1`, ...
pub fn members(count: usize) -> Vec<Member> {
    (0..count).map(|i| Member::new(format!("member-{i}"))).collect()
}

pub fn recipients(members: &[Member]) -> Vec<Recipient> {
    members.iter().map(Member::recipient).collect()
}

pub fn sample_profile() -> LinkedProfile {
    LinkedProfile {
        id: "31612345678@commeazy.local".into(),
        name: "Opa Henk".into(),
        phone_number: "+31612345678".into(),
        language: "nl".into(),
    }
}
