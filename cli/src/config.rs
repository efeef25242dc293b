use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

const DATA_DIR_ENV: &str = "MEALGRID_DATA_DIR";

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Config {
    /// Resolve the data directory: `MEALGRID_DATA_DIR` if set, otherwise the
    /// platform data directory for `mealgrid`.
    pub fn load() -> Result<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => ProjectDirs::from("", "", "mealgrid")
                .context("Could not determine home directory")?
                .data_dir()
                .to_path_buf(),
        };
        Self::from_data_dir(data_dir)
    }

    pub fn from_data_dir(data_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("mealgrid.db");

        Ok(Config { db_path, data_dir })
    }

    /// Load the API key from disk, or generate a new one.
    pub fn load_or_create_api_key(&self) -> Result<String> {
        use rand::Rng;
        use std::fmt::Write as _;
        use std::io::Write as _;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options
            .open(&path)
            .context("Failed to create API key file")?;
        file.write_all(key.as_bytes())
            .context("Failed to write API key file")?;

        tracing::info!(path = %path.display(), "generated new API key");
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_data_dir_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("mealgrid");
        let config = Config::from_data_dir(dir.clone()).unwrap();
        assert!(dir.is_dir());
        assert_eq!(config.db_path, dir.join("mealgrid.db"));
    }

    #[test]
    fn test_api_key_is_created_once() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::from_data_dir(tmp.path().to_path_buf()).unwrap();

        let key = config.load_or_create_api_key().unwrap();
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));

        let again = config.load_or_create_api_key().unwrap();
        assert_eq!(again, key);
    }

    #[test]
    fn test_empty_api_key_file_is_regenerated() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::from_data_dir(tmp.path().to_path_buf()).unwrap();
        std::fs::write(tmp.path().join("api_key"), "  \n").unwrap();

        let key = config.load_or_create_api_key().unwrap();
        assert_eq!(key.len(), 64);
        assert_eq!(
            std::fs::read_to_string(tmp.path().join("api_key")).unwrap(),
            key
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_api_key_file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::tempdir().unwrap();
        let config = Config::from_data_dir(tmp.path().to_path_buf()).unwrap();
        config.load_or_create_api_key().unwrap();
        let mode = std::fs::metadata(tmp.path().join("api_key"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
