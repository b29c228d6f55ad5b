//! Tipos de erro do canal de comunicação com o gateway.
//!
//! Define [`ChannelError`] para falhas de nível de canal — situações em que
//! nenhuma resposta do protocolo chegou. Usa `thiserror` para derivar
//! `Display` e `Error` a partir dos atributos `#[error(...)]`.

use thiserror::Error;

/// Falhas do canal de requisição/resposta.
///
/// Ambas as variantes são tratadas pelo controller como falhas transitórias
/// e contam contra o mesmo orçamento de retentativas:
/// - [`Network`](ChannelError::Network) — falha na camada de rede
/// - [`UnexpectedStatus`](ChannelError::UnexpectedStatus) — resposta fora do protocolo
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Falha de rede subjacente (DNS, conexão recusada, timeout).
    /// Encapsula o erro original do `reqwest` via `#[from]`.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// O gateway respondeu com um status fora do protocolo
    /// (diferente de 200/202/503 na submissão, 200/404 no status).
    #[error("gateway returned status {status}: {message}")]
    UnexpectedStatus { status: u16, message: String },
}
