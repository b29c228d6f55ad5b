//! Configuração do paysim carregada a partir de `paysim.toml`.
//!
//! A struct [`PaysimConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! A variável de ambiente `PAYSIM_ENDPOINT` tem precedência sobre o arquivo.

use anyhow::Result;
use serde::Deserialize;
use std::path::Path;

use crate::simulator::OutcomeWeights;
use crate::state_machine::RetryConfig;

/// Configuração de nível superior carregada de `paysim.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaysimConfig {
    /// URL base de um gateway remoto. Ausente, a simulação roda em processo.
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Máximo de retentativas antes de marcar uma submissão como falha.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Atraso base em milissegundos para backoff exponencial.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    /// Intervalo fixo entre consultas de status de uma submissão adiada.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Semente do simulador de desfechos; ausente, usa entropia do sistema.
    #[serde(default)]
    pub seed: Option<u64>,

    /// Pesos relativos do sorteio de desfechos.
    #[serde(default)]
    pub outcome: OutcomeWeights,

    /// Limite inferior da janela de atraso de sucesso adiado, em ms.
    #[serde(default = "default_delayed_min_ms")]
    pub delayed_min_ms: u64,

    /// Limite superior (exclusivo) da janela de atraso adiado, em ms.
    #[serde(default = "default_delayed_max_ms")]
    pub delayed_max_ms: u64,
}

// Valor padrão para retentativas máximas: 3.
fn default_max_retries() -> u32 {
    3
}

// Valor padrão para o atraso base: 1000ms.
fn default_base_delay_ms() -> u64 {
    1000
}

// Valor padrão para o intervalo de consulta: 1000ms.
fn default_poll_interval_ms() -> u64 {
    1000
}

// Janela padrão de sucesso adiado: [5000ms, 10000ms).
fn default_delayed_min_ms() -> u64 {
    5000
}

fn default_delayed_max_ms() -> u64 {
    10000
}

impl Default for PaysimConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            seed: None,
            outcome: OutcomeWeights::default(),
            delayed_min_ms: default_delayed_min_ms(),
            delayed_max_ms: default_delayed_max_ms(),
        }
    }
}

impl PaysimConfig {
    /// Carrega a configuração de `paysim.toml` no diretório atual.
    /// Usa valores padrão se o arquivo não existir.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(Path::new("paysim.toml"))?;

        // Variável de ambiente tem precedência sobre o arquivo para o endpoint.
        if let Ok(endpoint) = std::env::var("PAYSIM_ENDPOINT")
            && !endpoint.is_empty()
        {
            config.endpoint = Some(endpoint);
        }

        Ok(config)
    }

    /// Carrega a configuração do caminho fornecido, sem consultar o ambiente.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            Ok(toml::from_str::<PaysimConfig>(&contents)?)
        } else {
            Ok(Self::default())
        }
    }

    /// Recorta os parâmetros de timing usados pelo controller.
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay_ms: self.base_delay_ms,
            poll_interval_ms: self.poll_interval_ms,
        }
    }
}
