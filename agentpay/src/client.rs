//! x402 payment orchestration.
//!
//! A [`PaymentFlow`] walks one payment through the gateway's HTTP 402
//! challenge/response exchange:
//!
//! ```text
//! Idle -> AwaitingChallenge -> OptionSelected -> Authorized -> Submitted -> Settled | Failed
//! ```
//!
//! Nothing is retried. Each authorization carries a single-use nonce and a
//! short validity window, so a retry must start a fresh flow.

use std::time::SystemTimeError;

use bon::Builder;
use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};

use crate::{
    codec::{self, Base64EncodedHeader},
    errors::Error as CoreError,
    http_transport::{GatewayResponse, HttpTransport},
    networks::evm::EvmAddress,
    schemes::{
        exact_evm::{SignedAuthorizationPayload, TimestampSeconds},
        exact_evm_signer::{AuthorizationError, ExactEvmAuthorizer, TypedDataSigner},
    },
    transport::{
        GatewayReply, PAYMENT_RESPONSE_HEADER, PaymentChallenge, PaymentOption, SettlementResponse,
    },
    types::AmountValue,
};

/// Gateway path serving x402 challenges and accepting `X-PAYMENT` submissions.
pub const DEFAULT_X402_RESOURCE_PATH: &str = "/open/api/x402/payment";

/// Identifies what is being paid for. Sent as the query string of both the
/// challenge and the submission request.
#[derive(Builder, Debug, Clone, PartialEq, Eq)]
pub struct PaymentQuery {
    #[builder(into)]
    pub app_id: String,
    #[builder(into)]
    pub qr_code: String,
    /// The payer's wallet address. Must be the `from` of the authorization
    /// submitted for this query.
    #[builder(into)]
    pub address: String,
}

impl PaymentQuery {
    pub fn as_query(&self) -> [(&str, &str); 3] {
        [
            ("appId", &self.app_id),
            ("qrCode", &self.qr_code),
            ("address", &self.address),
        ]
    }
}

/// How to pick one option out of a challenge's `accepts`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OptionSelector {
    #[default]
    First,
    Index(usize),
    Matching { network: String, scheme: String },
}

impl OptionSelector {
    pub fn pick<'a>(&self, accepts: &'a [PaymentOption]) -> Option<&'a PaymentOption> {
        match self {
            OptionSelector::First => accepts.first(),
            OptionSelector::Index(index) => accepts.get(*index),
            OptionSelector::Matching { network, scheme } => accepts.iter().find(|option| {
                option.network.eq_ignore_ascii_case(network)
                    && option.scheme.eq_ignore_ascii_case(scheme)
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    /// Nothing sent yet.
    Idle,
    /// A challenge was received and an option must be picked.
    AwaitingChallenge,
    OptionSelected,
    Authorized,
    /// The signed authorization is in flight.
    Submitted,
    Settled,
    Failed,
}

#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Unexpected gateway response (code {code:?}): {message}")]
    UnexpectedGatewayResponse {
        code: Option<String>,
        message: String,
    },
    #[error("Payment rejected by gateway (code {code}): {message}")]
    Rejected { code: String, message: String },
    #[error("Authorization failed: {0}")]
    Authorization(#[from] AuthorizationError),
    #[error("Malformed header: {0}")]
    MalformedHeader(#[source] CoreError),
    #[error("Authorization expired at {valid_before}")]
    AuthorizationExpired { valid_before: TimestampSeconds },
    #[error("Authorization not valid before {valid_after}")]
    AuthorizationNotYetValid { valid_after: TimestampSeconds },
    #[error("Query payer {query} does not match authorization payer {authorization}")]
    PayerMismatch {
        query: String,
        authorization: EvmAddress,
    },
    /// The submit reply body could not be read. The receipt is kept because
    /// the gateway may have settled anyway.
    #[error("Unreadable settlement reply: {body}")]
    MalformedSettlementReply {
        body: String,
        receipt: Option<SettlementResponse>,
    },
    #[error("Cannot {action} while the flow is {state:?}")]
    InvalidState {
        action: &'static str,
        state: FlowState,
    },
    #[error("No payment option matches the selector")]
    NoMatchingOption,
    #[error("HTTP status {status}: {body}")]
    HttpStatus { status: StatusCode, body: String },
    #[error("Transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("System time error: {0}")]
    SystemTime(#[from] SystemTimeError),
}

impl PaymentError {
    fn transport<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        PaymentError::Transport(Box::new(err))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    Settled,
    /// The gateway's code and message, verbatim.
    Failed { code: String, message: String },
}

/// What the gateway answered to a submitted authorization.
#[derive(Debug, Clone)]
pub struct SettlementResult {
    pub status: StatusCode,
    pub reply: GatewayReply,
    /// Decoded `X-Payment-Response` header, when present and readable.
    pub receipt: Option<SettlementResponse>,
    pub outcome: SettlementOutcome,
    pub authorization: SignedAuthorizationPayload,
}

impl SettlementResult {
    pub fn is_settled(&self) -> bool {
        self.outcome == SettlementOutcome::Settled
    }

    /// Turn a gateway refusal into [`PaymentError::Rejected`].
    pub fn into_result(self) -> Result<Self, PaymentError> {
        match self.outcome {
            SettlementOutcome::Settled => Ok(self),
            SettlementOutcome::Failed { code, message } => {
                Err(PaymentError::Rejected { code, message })
            }
        }
    }

    fn from_response(
        response: GatewayResponse,
        authorization: SignedAuthorizationPayload,
    ) -> Result<Self, PaymentError> {
        let receipt = response.header(PAYMENT_RESPONSE_HEADER).and_then(|raw| {
            codec::decode::<SettlementResponse>(raw)
                .inspect_err(|_err| {
                    #[cfg(feature = "tracing")]
                    tracing::warn!("Failed to decode X-Payment-Response header: {_err}; ignoring");
                })
                .ok()
        });

        let reply: GatewayReply = match response.json() {
            Ok(reply) => reply,
            Err(_) => {
                #[cfg(feature = "tracing")]
                if let Some(receipt) = &receipt {
                    tracing::warn!(
                        "Unreadable settlement reply with receipt: transaction='{}', success={}",
                        receipt.transaction,
                        receipt.success
                    );
                }

                return Err(PaymentError::MalformedSettlementReply {
                    body: response.text(),
                    receipt,
                });
            }
        };

        let outcome = if reply.is_success() {
            SettlementOutcome::Settled
        } else {
            SettlementOutcome::Failed {
                code: reply.code.to_string(),
                message: reply.msg.clone(),
            }
        };

        Ok(SettlementResult {
            status: response.status,
            reply,
            receipt,
            outcome,
            authorization,
        })
    }
}

/// Client for the gateway's x402 endpoint.
///
/// Cloning is cheap when the transport and signer are; flows borrow the
/// client and never mutate it, so any number may run concurrently.
#[derive(Builder, Debug, Clone)]
pub struct X402Client<T, S> {
    pub transport: T,
    pub authorizer: ExactEvmAuthorizer<S>,
    #[builder(into, default = DEFAULT_X402_RESOURCE_PATH.to_string())]
    pub resource_path: String,
}

impl<T: HttpTransport, S> X402Client<T, S> {
    /// Begin a new payment flow in the `Idle` state.
    pub fn start(&self, query: PaymentQuery) -> PaymentFlow<'_, T, S> {
        PaymentFlow {
            client: self,
            query,
            state: FlowState::Idle,
            challenge: None,
            selected: None,
            authorization: None,
        }
    }

    /// Fetch the 402 challenge for `query`.
    ///
    /// Accepts either HTTP 402 or 2xx, as long as the body carries code
    /// `"402"` and at least one option.
    pub async fn get_payment_info(
        &self,
        query: &PaymentQuery,
    ) -> Result<PaymentChallenge, PaymentError> {
        let response = self
            .transport
            .get(&self.resource_path, &query.as_query(), HeaderMap::new())
            .await
            .map_err(PaymentError::transport)?;

        if !response.status.is_success() && response.status != StatusCode::PAYMENT_REQUIRED {
            return Err(PaymentError::HttpStatus {
                status: response.status,
                body: response.text(),
            });
        }

        let challenge: PaymentChallenge =
            response
                .json()
                .map_err(|_| PaymentError::UnexpectedGatewayResponse {
                    code: None,
                    message: response.text(),
                })?;

        if !challenge.code.is_payment_required() {
            return Err(PaymentError::UnexpectedGatewayResponse {
                code: Some(challenge.code.to_string()),
                message: challenge.msg,
            });
        }

        if challenge.accepts.is_empty() {
            return Err(PaymentError::UnexpectedGatewayResponse {
                code: Some(challenge.code.to_string()),
                message: if challenge.msg.is_empty() {
                    "Challenge offered no payment options".to_string()
                } else {
                    challenge.msg
                },
            });
        }

        Ok(challenge)
    }

    /// Re-issue the challenge request with the encoded authorization attached.
    pub async fn submit_payment(
        &self,
        query: &PaymentQuery,
        authorization: &SignedAuthorizationPayload,
    ) -> Result<GatewayResponse, PaymentError> {
        let header = Base64EncodedHeader::encode(authorization).map_err(PaymentError::MalformedHeader)?;
        let value = HeaderValue::from_str(header.as_str()).map_err(|err| {
            PaymentError::MalformedHeader(CoreError::MalformedHeader(err.to_string()))
        })?;

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static("x-payment"), value);

        let response = self
            .transport
            .get(&self.resource_path, &query.as_query(), headers)
            .await
            .map_err(PaymentError::transport)?;

        if !response.status.is_success() && response.status != StatusCode::PAYMENT_REQUIRED {
            return Err(PaymentError::HttpStatus {
                status: response.status,
                body: response.text(),
            });
        }

        Ok(response)
    }
}

impl<T: HttpTransport, S: TypedDataSigner> X402Client<T, S> {
    /// Run a complete flow: challenge, selection, authorization, submission.
    ///
    /// A gateway refusal is reported through [`SettlementResult::outcome`];
    /// use [`SettlementResult::into_result`] to treat it as an error.
    pub async fn pay(
        &self,
        query: PaymentQuery,
        selector: &OptionSelector,
        amount_override: Option<AmountValue>,
    ) -> Result<SettlementResult, PaymentError> {
        let mut flow = self.start(query);
        flow.fetch_challenge().await?;
        flow.select(selector)?;
        flow.authorize(amount_override).await?;
        flow.submit().await
    }
}

/// One payment attempt. See the module docs for the state diagram.
#[derive(Debug)]
pub struct PaymentFlow<'a, T, S> {
    client: &'a X402Client<T, S>,
    query: PaymentQuery,
    state: FlowState,
    challenge: Option<PaymentChallenge>,
    selected: Option<PaymentOption>,
    authorization: Option<SignedAuthorizationPayload>,
}

impl<T, S> PaymentFlow<'_, T, S> {
    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn query(&self) -> &PaymentQuery {
        &self.query
    }

    pub fn challenge(&self) -> Option<&PaymentChallenge> {
        self.challenge.as_ref()
    }

    pub fn selected(&self) -> Option<&PaymentOption> {
        self.selected.as_ref()
    }

    pub fn authorization(&self) -> Option<&SignedAuthorizationPayload> {
        self.authorization.as_ref()
    }

    fn require(&self, expected: FlowState, action: &'static str) -> Result<(), PaymentError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(PaymentError::InvalidState {
                action,
                state: self.state,
            })
        }
    }

    fn transition(&mut self, next: FlowState) {
        #[cfg(feature = "tracing")]
        tracing::debug!(
            "Payment flow for qrCode='{}': {:?} -> {:?}",
            self.query.qr_code,
            self.state,
            next
        );

        self.state = next;
    }

    fn fail<R>(&mut self, err: PaymentError) -> Result<R, PaymentError> {
        self.transition(FlowState::Failed);
        Err(err)
    }

    /// Pick one option from the challenge.
    ///
    /// When nothing matches, the flow stays put so another selector can be
    /// tried.
    pub fn select(&mut self, selector: &OptionSelector) -> Result<&PaymentOption, PaymentError> {
        self.require(FlowState::AwaitingChallenge, "select an option")?;

        let option = self
            .challenge
            .as_ref()
            .and_then(|challenge| selector.pick(&challenge.accepts))
            .cloned()
            .ok_or(PaymentError::NoMatchingOption)?;

        self.transition(FlowState::OptionSelected);
        Ok(self.selected.insert(option))
    }
}

impl<T: HttpTransport, S> PaymentFlow<'_, T, S> {
    pub async fn fetch_challenge(&mut self) -> Result<&PaymentChallenge, PaymentError> {
        self.require(FlowState::Idle, "fetch a challenge")?;

        let fetched = self.client.get_payment_info(&self.query).await;
        match fetched {
            Ok(challenge) => {
                self.transition(FlowState::AwaitingChallenge);
                Ok(self.challenge.insert(challenge))
            }
            Err(err) => self.fail(err),
        }
    }

    pub async fn submit(&mut self) -> Result<SettlementResult, PaymentError> {
        let now = TimestampSeconds::now()?;
        self.submit_at(now).await
    }

    /// Submit the authorization, refusing it unless
    /// `validAfter <= now <= validBefore`.
    pub async fn submit_at(&mut self, now: TimestampSeconds) -> Result<SettlementResult, PaymentError> {
        self.require(FlowState::Authorized, "submit")?;

        let Some(authorization) = self.authorization.clone() else {
            return Err(PaymentError::InvalidState {
                action: "submit",
                state: self.state,
            });
        };

        let window = &authorization.payload.authorization;
        if !window.is_valid_at(now) {
            let err = if now < window.valid_after {
                PaymentError::AuthorizationNotYetValid {
                    valid_after: window.valid_after,
                }
            } else {
                PaymentError::AuthorizationExpired {
                    valid_before: window.valid_before,
                }
            };
            return self.fail(err);
        }

        self.transition(FlowState::Submitted);

        let submitted = self.client.submit_payment(&self.query, &authorization).await;
        let response = match submitted {
            Ok(response) => response,
            Err(err) => return self.fail(err),
        };

        let result = match SettlementResult::from_response(response, authorization) {
            Ok(result) => result,
            Err(err) => return self.fail(err),
        };

        match &result.outcome {
            SettlementOutcome::Settled => {
                #[cfg(feature = "tracing")]
                tracing::info!(
                    "Payment settled: qrCode='{}', transaction='{}'",
                    self.query.qr_code,
                    result
                        .receipt
                        .as_ref()
                        .map(|receipt| receipt.transaction.as_str())
                        .unwrap_or_default()
                );

                self.transition(FlowState::Settled);
            }
            SettlementOutcome::Failed { .. } => {
                #[cfg(feature = "tracing")]
                tracing::warn!(
                    "Payment rejected: qrCode='{}', code='{}', msg='{}'",
                    self.query.qr_code,
                    result.reply.code,
                    result.reply.msg
                );

                self.transition(FlowState::Failed);
            }
        }

        Ok(result)
    }
}

impl<T: HttpTransport, S: TypedDataSigner> PaymentFlow<'_, T, S> {
    pub async fn authorize(
        &mut self,
        amount_override: Option<AmountValue>,
    ) -> Result<&SignedAuthorizationPayload, PaymentError> {
        let now = TimestampSeconds::now()?;
        self.authorize_at(amount_override, now).await
    }

    pub async fn authorize_at(
        &mut self,
        amount_override: Option<AmountValue>,
        now: TimestampSeconds,
    ) -> Result<&SignedAuthorizationPayload, PaymentError> {
        self.require(FlowState::OptionSelected, "authorize")?;

        let Some(option) = self.selected.as_ref() else {
            return Err(PaymentError::InvalidState {
                action: "authorize",
                state: self.state,
            });
        };

        let authorized = self
            .client
            .authorizer
            .authorize_at(option, amount_override, now)
            .await;
        let authorization = match authorized {
            Ok(authorization) => authorization,
            Err(err) => return self.fail(err.into()),
        };

        let from = authorization.payload.authorization.from;
        let matches_query = self
            .query
            .address
            .parse::<EvmAddress>()
            .is_ok_and(|address| address == from);
        if !matches_query {
            return self.fail(PaymentError::PayerMismatch {
                query: self.query.address.clone(),
                authorization: from,
            });
        }

        self.transition(FlowState::Authorized);
        Ok(self.authorization.insert(authorization))
    }
}
