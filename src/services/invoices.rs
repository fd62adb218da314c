use std::sync::Arc;

use crate::domain::{
    Amount, BusinessId, NewPaymentRequest, PaymentRequest, PaymentRequestId,
    PaymentRequestStatus, TransactionKind,
};
use crate::ports::{RepositoryError, Store};
use crate::services::balance::persist_with_retry;
use crate::services::locks::KeyedLocks;
use crate::services::settlement::{SettlementOutcome, TransferEngine, TransferOrder};
use crate::services::{PaymentError, PaymentResult};

/// Outcome of paying a request: the closed request and its settlement.
#[derive(Debug, Clone)]
pub struct PaidRequest {
    pub request: PaymentRequest,
    pub settlement: SettlementOutcome,
}

pub struct InvoiceService {
    store: Arc<dyn Store>,
    engine: Arc<TransferEngine>,
    request_locks: KeyedLocks<PaymentRequestId>,
}

impl InvoiceService {
    pub fn new(store: Arc<dyn Store>, engine: Arc<TransferEngine>) -> Self {
        Self {
            store,
            engine,
            request_locks: KeyedLocks::new(),
        }
    }

    /// Raises a pending request asking the business registered under
    /// `to_business_email` to pay `from_business_id`.
    pub async fn create_invoice(
        &self,
        from_business_id: BusinessId,
        to_business_email: &str,
        amount: Amount,
        memo: Option<String>,
    ) -> PaymentResult<PaymentRequest> {
        let payer = self
            .store
            .business_by_email(to_business_email)
            .await?
            .ok_or_else(|| PaymentError::BusinessNotFound(to_business_email.to_string()))?;

        if payer.id == from_business_id {
            return Err(PaymentError::Validation(
                "cannot invoice your own business".to_string(),
            ));
        }

        let request = self
            .store
            .insert_payment_request(NewPaymentRequest {
                from_business_id,
                to_business_id: payer.id,
                amount,
                memo,
            })
            .await?;

        tracing::info!(
            request_id = request.id,
            requester = from_business_id,
            payer = payer.id,
            amount = %amount,
            "Payment request created"
        );
        Ok(request)
    }

    /// Settles a pending request from the payer's wallet. A failed
    /// settlement leaves the request pending.
    pub async fn pay_request(
        &self,
        request_id: PaymentRequestId,
        payer_business_id: BusinessId,
    ) -> PaymentResult<PaidRequest> {
        let _guard = self.request_locks.lock(&request_id).await;

        let request = self.load_pending(request_id, |request| {
            if request.to_business_id == payer_business_id {
                Ok(())
            } else {
                Err(PaymentError::NotAuthorized(
                    "only the invoiced business can pay this request".to_string(),
                ))
            }
        })
        .await?;

        let sender = self
            .store
            .wallet_for_business(payer_business_id)
            .await?
            .ok_or(PaymentError::WalletNotFound(payer_business_id))?;
        let recipient = self
            .store
            .wallet_for_business(request.from_business_id)
            .await?
            .ok_or(PaymentError::WalletNotFound(request.from_business_id))?;

        let settlement = self
            .engine
            .settle(TransferOrder {
                kind: TransactionKind::Invoice,
                sender_business_id: payer_business_id,
                sender,
                destination: recipient.public_key.clone(),
                recipient: Some(recipient),
                amount: request.amount,
                memo: request.memo.clone(),
            })
            .await?;

        let transaction_id = settlement.transaction.id;
        let request = persist_with_retry("Closing paid request", || {
            self.store
                .close_payment_request(request_id, PaymentRequestStatus::Paid, Some(transaction_id))
        })
        .await
        .map_err(|e| {
            tracing::error!(
                request_id,
                transaction_id,
                error = %e,
                "Request was settled but could not be closed"
            );
            match e {
                RepositoryError::Conflict(msg) => PaymentError::InvalidState(msg),
                other => PaymentError::Storage(other),
            }
        })?;

        tracing::info!(
            request_id,
            transaction_id,
            "Payment request paid"
        );
        Ok(PaidRequest {
            request,
            settlement,
        })
    }

    /// Withdraws a pending request. Only the requester may cancel.
    pub async fn cancel_request(
        &self,
        request_id: PaymentRequestId,
        requester_business_id: BusinessId,
    ) -> PaymentResult<PaymentRequest> {
        let _guard = self.request_locks.lock(&request_id).await;

        self.load_pending(request_id, |request| {
            if request.from_business_id == requester_business_id {
                Ok(())
            } else {
                Err(PaymentError::NotAuthorized(
                    "only the requesting business can cancel this request".to_string(),
                ))
            }
        })
        .await?;

        let request = self
            .store
            .close_payment_request(request_id, PaymentRequestStatus::Cancelled, None)
            .await
            .map_err(|e| match e {
                RepositoryError::Conflict(msg) => PaymentError::InvalidState(msg),
                other => PaymentError::Storage(other),
            })?;

        tracing::info!(request_id, "Payment request cancelled");
        Ok(request)
    }

    /// Requests the business owes or is owed, newest first.
    pub async fn list_for_business(
        &self,
        business_id: BusinessId,
    ) -> PaymentResult<Vec<PaymentRequest>> {
        Ok(self.store.payment_requests_for_business(business_id).await?)
    }

    async fn load_pending<F>(
        &self,
        request_id: PaymentRequestId,
        authorize: F,
    ) -> PaymentResult<PaymentRequest>
    where
        F: FnOnce(&PaymentRequest) -> PaymentResult<()>,
    {
        let request = self
            .store
            .payment_request(request_id)
            .await?
            .ok_or(PaymentError::RequestNotFound(request_id))?;

        authorize(&request)?;

        if request.status != PaymentRequestStatus::Pending {
            return Err(PaymentError::InvalidState(format!(
                "payment request {} is {}",
                request_id, request.status
            )));
        }
        Ok(request)
    }
}
