//! Tipos de dados do protocolo de submissão trafegados no canal
//! requisição/resposta entre o controller e o gateway.
//!
//! Todas as structs derivam `Serialize` e `Deserialize` para conversão JSON
//! conforme o formato esperado pelos endpoints `/submit` e `/status` do
//! gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Mensagem retornada em toda resposta de sucesso.
pub const SUCCESS_MESSAGE: &str = "payment processed successfully";

/// Mensagem retornada quando a submissão é aceita com resolução adiada.
pub const ACCEPTED_MESSAGE: &str = "payment accepted for processing";

/// Mensagem de erro retornada em falhas transitórias.
pub const TRANSIENT_ERROR: &str = "service temporarily unavailable";

/// Corpo da requisição de submissão enviada ao gateway.
///
/// O `request_id` é a chave de idempotência: gerado uma única vez por
/// submissão lógica e reutilizado em toda retentativa e consulta de status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitRequest {
    /// Chave de idempotência no formato `{email}-{timestamp}-{token}`.
    pub request_id: String,
    /// Email do remetente da submissão.
    pub email: String,
    /// Valor monetário da submissão.
    pub amount: f64,
}

/// Situação de um registro de submissão no ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    /// Registro criado mas ainda não resolvido.
    Pending,
    /// Registro resolvido com sucesso.
    Success,
}

/// Resposta de sucesso (equivalente a HTTP 200).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuccessBody {
    pub message: String,
    pub request_id: String,
    pub email: String,
    pub amount: f64,
    /// Instante em que o registro foi resolvido no servidor.
    pub timestamp: DateTime<Utc>,
}

/// Resposta de aceitação com resolução adiada (equivalente a HTTP 202).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceptedBody {
    pub message: String,
    pub request_id: String,
    pub email: String,
    pub amount: f64,
    /// Estimativa, em milissegundos, até o registro resolver sozinho.
    pub estimated_delay_ms: u64,
}

/// Resposta de falha transitória (equivalente a HTTP 503).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureBody {
    pub error: String,
    pub request_id: String,
    /// Sugestão de espera antes de retentar, em segundos.
    pub retry_after_seconds: u64,
}

/// As três variantes de resposta de uma submissão.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitResponse {
    Success(SuccessBody),
    Accepted(AcceptedBody),
    TransientFailure(FailureBody),
}

/// Corpo da resposta de consulta de status — o registro do ledger verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusBody {
    pub request_id: String,
    pub status: SubmissionStatus,
    pub email: String,
    pub amount: f64,
    /// Presente apenas quando o registro já resolveu.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Resultado de uma consulta de status.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusResponse {
    Found(StatusBody),
    /// O `request_id` nunca foi submetido (equivalente a HTTP 404).
    NotFound { request_id: String },
}
