//! Secure Settings Storage
//!
//! Persists the user's endpoint/model/key override and theme choice under the
//! data directory. The API key is encrypted with AES-256-GCM; everything else
//! is plain JSON.

use super::{SettingsOverride, Theme};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

const SETTINGS_FILE: &str = "api_config.json";
const ENCRYPTION_KEY_FILE: &str = ".settings_key";
const THEME_FILE: &str = "theme";
const NONCE_SIZE: usize = 12;

/// Settings storage manager
pub struct SettingsStorage {
    base_dir: PathBuf,
    settings_path: PathBuf,
    key_path: PathBuf,
    theme_path: PathBuf,
}

impl SettingsStorage {
    pub fn with_path(base_dir: PathBuf) -> Self {
        Self {
            settings_path: base_dir.join(SETTINGS_FILE),
            key_path: base_dir.join(ENCRYPTION_KEY_FILE),
            theme_path: base_dir.join(THEME_FILE),
            base_dir,
        }
    }

    async fn ensure_dir(&self) -> anyhow::Result<()> {
        fs::create_dir_all(&self.base_dir).await?;
        Ok(())
    }

    /// Get or create the encryption key
    async fn get_or_create_key(&self) -> anyhow::Result<[u8; 32]> {
        self.ensure_dir().await?;

        if fs::try_exists(&self.key_path).await? {
            let key_data = fs::read(&self.key_path).await?;
            let key_bytes = BASE64.decode(&key_data)?;
            if key_bytes.len() == 32 {
                let mut key = [0u8; 32];
                key.copy_from_slice(&key_bytes);
                return Ok(key);
            }
            warn!("Settings key file is malformed, generating a new one");
        }

        let key: [u8; 32] = rand::random();
        fs::write(&self.key_path, BASE64.encode(key)).await?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.key_path, perms).await?;
        }

        info!("Generated new encryption key for settings");
        Ok(key)
    }

    fn encrypt(&self, plaintext: &str, key: &[u8; 32]) -> anyhow::Result<String> {
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Invalid settings key: {}", e))?;
        let nonce_bytes: [u8; NONCE_SIZE] = rand::random();
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| anyhow::anyhow!("Encryption failed: {}", e))?;

        // nonce || ciphertext
        let mut combined = nonce_bytes.to_vec();
        combined.extend(ciphertext);
        Ok(BASE64.encode(&combined))
    }

    fn decrypt(&self, encrypted: &str, key: &[u8; 32]) -> anyhow::Result<String> {
        let combined = BASE64.decode(encrypted)?;
        if combined.len() < NONCE_SIZE {
            return Err(anyhow::anyhow!("Invalid encrypted data"));
        }

        let (nonce_bytes, ciphertext) = combined.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|e| anyhow::anyhow!("Invalid settings key: {}", e))?;
        let nonce = Nonce::from_slice(nonce_bytes);

        let plaintext = cipher
            .decrypt(nonce, ciphertext)
            .map_err(|e| anyhow::anyhow!("Decryption failed: {}", e))?;

        String::from_utf8(plaintext).map_err(Into::into)
    }

    /// Load the persisted override. `None` when nothing was ever saved.
    ///
    /// A key that fails to decrypt is dropped with a warning so the built-in
    /// key takes over instead of failing startup.
    pub async fn load_override(&self) -> anyhow::Result<Option<SettingsOverride>> {
        if !fs::try_exists(&self.settings_path).await? {
            info!("No saved settings found, using defaults");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.settings_path).await?;
        let mut saved: SettingsOverride = match serde_json::from_str(&content) {
            Ok(saved) => saved,
            Err(e) => {
                warn!("Ignoring unreadable settings file {:?}: {}", self.settings_path, e);
                return Ok(None);
            }
        };

        if let Some(encrypted) = saved.api_key.take().filter(|k| !k.is_empty()) {
            let key = self.get_or_create_key().await?;
            match self.decrypt(&encrypted, &key) {
                Ok(decrypted) => saved.api_key = Some(decrypted),
                Err(e) => warn!("Failed to decrypt API key, it may be corrupted: {}", e),
            }
        }

        info!("Loaded settings from {:?}", self.settings_path);
        Ok(Some(saved))
    }

    pub async fn save_override(&self, settings: &SettingsOverride) -> anyhow::Result<()> {
        self.ensure_dir().await?;

        let mut encrypted = settings.normalized();
        if let Some(api_key) = encrypted.api_key.take() {
            let key = self.get_or_create_key().await?;
            encrypted.api_key = Some(self.encrypt(&api_key, &key)?);
        }

        let content = serde_json::to_string_pretty(&encrypted)?;
        fs::write(&self.settings_path, content).await?;

        info!("Saved settings to {:?}", self.settings_path);
        Ok(())
    }

    /// Remove the persisted override. Missing files are not an error.
    pub async fn clear_override(&self) -> anyhow::Result<()> {
        match fs::remove_file(&self.settings_path).await {
            Ok(()) => {
                info!("Removed saved settings {:?}", self.settings_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn load_theme(&self) -> anyhow::Result<Option<Theme>> {
        if !fs::try_exists(&self.theme_path).await? {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.theme_path).await?;
        Ok(Theme::from_id(&content))
    }

    pub async fn save_theme(&self, theme: Theme) -> anyhow::Result<()> {
        self.ensure_dir().await?;
        fs::write(&self.theme_path, theme.as_str()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_override_roundtrip_encrypts_key() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().to_path_buf());

        let settings = SettingsOverride {
            api_endpoint: Some("https://llm.example/v1/chat/completions".to_string()),
            model: None,
            api_key: Some("sk-test-key-12345".to_string()),
        };
        storage.save_override(&settings).await.unwrap();

        let raw = std::fs::read_to_string(temp_dir.path().join(SETTINGS_FILE)).unwrap();
        assert!(!raw.contains("sk-test-key-12345"));
        assert!(!raw.contains("\"model\""));

        let loaded = storage.load_override().await.unwrap().unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_missing_and_cleared() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().join("nested"));

        assert_eq!(storage.load_override().await.unwrap(), None);
        storage.clear_override().await.unwrap();

        storage
            .save_override(&SettingsOverride {
                model: Some("m".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        storage.clear_override().await.unwrap();
        assert_eq!(storage.load_override().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupted_key_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(SETTINGS_FILE),
            r#"{"model":"m","apiKey":"not-valid-ciphertext"}"#,
        )
        .unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().to_path_buf());

        let loaded = storage.load_override().await.unwrap().unwrap();
        assert_eq!(loaded.model.as_deref(), Some("m"));
        assert_eq!(loaded.api_key, None);
    }

    #[tokio::test]
    async fn test_encryption() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().to_path_buf());

        let key = storage.get_or_create_key().await.unwrap();
        let plaintext = "secret-api-key-12345";

        let encrypted = storage.encrypt(plaintext, &key).unwrap();
        assert_ne!(encrypted, plaintext);

        let decrypted = storage.decrypt(&encrypted, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[tokio::test]
    async fn test_malformed_key_file_is_replaced() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(ENCRYPTION_KEY_FILE), BASE64.encode([7u8; 16])).unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().to_path_buf());

        let key = storage.get_or_create_key().await.unwrap();
        let encrypted = storage.encrypt("sk-after-regeneration", &key).unwrap();
        assert_eq!(storage.decrypt(&encrypted, &key).unwrap(), "sk-after-regeneration");

        let other: [u8; 32] = [1; 32];
        let err = storage.decrypt(&encrypted, &other).unwrap_err();
        assert!(err.to_string().contains("Decryption failed"));
    }

    #[tokio::test]
    async fn test_theme_file() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SettingsStorage::with_path(temp_dir.path().to_path_buf());

        assert_eq!(storage.load_theme().await.unwrap(), None);
        storage.save_theme(Theme::Dark).await.unwrap();
        assert_eq!(storage.load_theme().await.unwrap(), Some(Theme::Dark));
    }
}
