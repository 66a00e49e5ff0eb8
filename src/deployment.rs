use crate::contract::SEPOLIA_LOTTERY_ADDRESS;
use alloy::primitives::Address;
use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use sha2::{
    Digest,
    Sha256,
};
use std::{
    fmt,
    fs,
    path::{
        Path,
        PathBuf,
    },
    str::FromStr,
};
use url::Url;

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";
pub const DEFAULT_LOCAL_RPC_URL: &str = "http://localhost:8545";

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, clap::ValueEnum)]
pub enum Network {
    #[default]
    Sepolia,
    Mainnet,
    Arbitrum,
    Local,
}

impl Network {
    pub fn dir_name(self) -> &'static str {
        match self {
            Network::Sepolia => "sepolia",
            Network::Mainnet => "mainnet",
            Network::Arbitrum => "arbitrum",
            Network::Local => "local",
        }
    }

    fn infura_subdomain(self) -> Option<&'static str> {
        match self {
            Network::Sepolia => Some("sepolia"),
            Network::Mainnet => Some("mainnet"),
            Network::Arbitrum => Some("arbitrum-mainnet"),
            Network::Local => None,
        }
    }

    pub fn known_lottery(self) -> Option<Address> {
        match self {
            Network::Sepolia => Some(SEPOLIA_LOTTERY_ADDRESS),
            _ => None,
        }
    }

    /// Endpoint precedence: explicit URL, then Infura with `infura_key`, then
    /// the local default for [`Network::Local`].
    pub fn rpc_url(self, explicit: Option<&str>, infura_key: Option<&str>) -> Result<Url> {
        if let Some(raw) = explicit {
            return Url::parse(raw).with_context(|| format!("Invalid RPC URL '{raw}'"));
        }
        match (self.infura_subdomain(), infura_key) {
            (Some(subdomain), Some(key)) if !key.trim().is_empty() => {
                let raw = format!("https://{subdomain}.infura.io/v3/{}", key.trim());
                Url::parse(&raw).context("Failed to build Infura URL")
            }
            (None, _) => Url::parse(DEFAULT_LOCAL_RPC_URL).context("Invalid local RPC URL"),
            (Some(_), _) => Err(anyhow!(
                "No RPC endpoint for {self}: pass --rpc-url or an Infura key (--infura-key / LOTTERY_INFURA_KEY)"
            )),
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Sepolia => "Sepolia",
            Network::Mainnet => "Mainnet",
            Network::Arbitrum => "Arbitrum",
            Network::Local => "Local",
        };
        write!(f, "{name}")
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub recorded_at: String,
    pub contract_address: String,
    #[serde(default)]
    pub network_url: Option<String>,
    /// sha256 of the deployed bytecode, hex encoded
    #[serde(default)]
    pub code_hash: Option<String>,
}

impl DeploymentRecord {
    pub fn new(
        contract_address: Address,
        network_url: Option<String>,
        code_hash: Option<String>,
    ) -> Self {
        Self {
            recorded_at: Utc::now().to_rfc3339(),
            contract_address: contract_address.to_checksum(None),
            network_url,
            code_hash,
        }
    }

    pub fn address(&self) -> Result<Address> {
        Address::from_str(self.contract_address.trim()).with_context(|| {
            format!(
                "Deployment record contains an invalid contract address: {}",
                self.contract_address
            )
        })
    }

    /// Records without a hash are trusted as-is.
    pub fn is_compatible_with_hash(&self, hash: &str) -> bool {
        self.code_hash
            .as_deref()
            .is_none_or(|expected| expected.eq_ignore_ascii_case(hash))
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(network: Network) -> Result<Self> {
        Self::in_root(Path::new(DEPLOYMENTS_ROOT), network)
    }

    pub fn in_root(root: &Path, network: Network) -> Result<Self> {
        let path = ensure_store(root, network)?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        write_record(&self.path, record)
    }
}

pub fn compute_code_hash(code: &[u8]) -> String {
    hex::encode(Sha256::digest(code))
}

/// Contract address precedence: explicit flag, stored record, built-in.
pub fn resolve_lottery_address(
    network: Network,
    explicit: Option<Address>,
    record: Option<&DeploymentRecord>,
) -> Result<Address> {
    if let Some(address) = explicit {
        return Ok(address);
    }
    if let Some(record) = record {
        return record.address();
    }
    network.known_lottery().ok_or_else(|| {
        anyhow!("No lottery address known for {network}; pass --contract or run `pin`")
    })
}

fn ensure_store(root: &Path, network: Network) -> Result<PathBuf> {
    let env_dir = root.join(network.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {} directory", env_dir.display())
        })?;
    }
    Ok(env_dir.join(DEPLOYMENTS_FILE))
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(None);
    }
    let data = fs::read(path).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}
