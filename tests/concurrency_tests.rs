// ============================================================================
// CONCURRENCY TESTS - Un solo ganador bajo canjes simultáneos
// ============================================================================

#[cfg(test)]
mod concurrency_tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use futures::future::join_all;
    use serde_json::json;
    use uuid::Uuid;

    use canje_core::audit::MemoryAuditSink;
    use canje_core::domains::tokens::{
        AuditAction, BenefitKind, IssueRequest, IssuedToken, NewToken, RedeemOutcome,
        RedeemRequest, RedemptionLedger, RejectReason, TokenIssuer, TokenSigner, TokenStatus,
    };
    use canje_core::store::{MemoryTokenStore, TokenStore};

    // ========================================================================
    // HELPER FUNCTIONS
    // ========================================================================

    struct CanjeStack {
        store: Arc<MemoryTokenStore>,
        audit: Arc<MemoryAuditSink>,
        issuer: TokenIssuer,
        ledger: Arc<RedemptionLedger>,
    }

    fn setup_stack() -> CanjeStack {
        let store = Arc::new(MemoryTokenStore::new());
        let audit = Arc::new(MemoryAuditSink::new());
        let signer = Arc::new(
            TokenSigner::new(b"un-secreto-de-pruebas-con-32-bytes!!")
                .expect("Failed to build signer"),
        );

        let issuer = TokenIssuer::new(
            store.clone(),
            audit.clone(),
            signer,
            Duration::seconds(600),
        );
        let ledger = Arc::new(RedemptionLedger::new(store.clone(), audit.clone()));

        CanjeStack {
            store,
            audit,
            issuer,
            ledger,
        }
    }

    async fn issue_coupon(stack: &CanjeStack, ttl_secs: i64) -> IssuedToken {
        stack
            .issuer
            .issue(IssueRequest {
                subject_id: 7,
                kind: BenefitKind::Coupon,
                benefit_ref: Some(Uuid::new_v4()),
                ttl: Duration::seconds(ttl_secs),
                metadata: None,
            })
            .await
            .expect("Failed to issue test token")
    }

    // ========================================================================
    // CONCURRENT REDEMPTIONS
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_redeems_have_exactly_one_winner() {
        println!("\n🚀 Running concurrency test: 8 simultaneous redemptions");
        let stack = setup_stack();
        let issued = issue_coupon(&stack, 60).await;

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ledger = stack.ledger.clone();
                let token_id = issued.token_id;
                tokio::spawn(async move {
                    ledger
                        .redeem(RedeemRequest {
                            token_id,
                            redeemer_id: 100 + i,
                            location: None,
                            amount_context: None,
                        })
                        .await
                        .expect("Redeem call failed")
                })
            })
            .collect();

        let outcomes: Vec<RedeemOutcome> = join_all(handles)
            .await
            .into_iter()
            .map(|joined| joined.expect("Task panicked"))
            .collect();

        let winners: Vec<_> = outcomes.iter().filter(|o| o.is_redeemed()).collect();
        let rejections: Vec<_> = outcomes.iter().filter_map(|o| o.reject_reason()).collect();
        assert_eq!(winners.len(), 1);
        assert_eq!(rejections.len(), 7);
        assert!(rejections.iter().all(|r| *r == RejectReason::AlreadyUsed));
        println!("✅ Exactly one winner, 7 already_used rejections");

        // La fila registra al mismo ganador que el resultado devuelto
        let winner_id = match winners[0] {
            RedeemOutcome::Redeemed(token) => token.redeemed_by,
            _ => unreachable!(),
        };
        let row = stack
            .store
            .get_token(issued.token_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, TokenStatus::Used);
        assert_eq!(row.redeemed_by, winner_id);

        // Bitácora: los 8 intentos quedan, uno solo aceptado
        let used_events: Vec<_> = stack
            .audit
            .events()
            .into_iter()
            .filter(|e| e.action == AuditAction::Used)
            .collect();
        assert_eq!(used_events.len(), 8);
        let accepted = used_events
            .iter()
            .filter(|e| e.outcome["accepted"] == json!(true))
            .count();
        assert_eq!(accepted, 1);
        println!("🎉 Concurrency test passed");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_two_service_instances_share_one_winner() {
        // Dos libros de canje sobre el mismo almacén, como dos instancias
        // del servicio. La coordinación vive en el almacén, no en memoria
        // del proceso.
        let stack = setup_stack();
        let other_ledger = Arc::new(RedemptionLedger::new(
            stack.store.clone(),
            stack.audit.clone(),
        ));
        let issued = issue_coupon(&stack, 60).await;

        let ledger_a = stack.ledger.clone();
        let ledger_b = other_ledger.clone();
        let token_id = issued.token_id;

        let task_a = tokio::spawn(async move {
            ledger_a
                .redeem(RedeemRequest {
                    token_id,
                    redeemer_id: 201,
                    location: None,
                    amount_context: None,
                })
                .await
                .expect("Redeem call failed")
        });
        let task_b = tokio::spawn(async move {
            ledger_b
                .redeem(RedeemRequest {
                    token_id,
                    redeemer_id: 202,
                    location: None,
                    amount_context: None,
                })
                .await
                .expect("Redeem call failed")
        });

        let (outcome_a, outcome_b) = (
            task_a.await.expect("Task panicked"),
            task_b.await.expect("Task panicked"),
        );

        assert_ne!(outcome_a.is_redeemed(), outcome_b.is_redeemed());
        let loser = if outcome_a.is_redeemed() {
            &outcome_b
        } else {
            &outcome_a
        };
        assert_eq!(loser.reject_reason(), Some(RejectReason::AlreadyUsed));
    }

    // ========================================================================
    // REDEEM vs SWEEP
    // ========================================================================

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_redeem_and_sweep_converge_on_stale_token() {
        let stack = setup_stack();

        // Fila issued vencida de hace un minuto, aún sin barrer
        let now = Utc::now();
        let token_id = stack
            .store
            .insert_token(&NewToken {
                subject_id: 7,
                kind: BenefitKind::Coupon,
                benefit_ref: None,
                issued_at: now - Duration::seconds(120),
                expires_at: now - Duration::seconds(60),
                metadata: None,
            })
            .await
            .unwrap();

        let (outcome, swept) = tokio::join!(
            stack.ledger.redeem(RedeemRequest {
                token_id,
                redeemer_id: 42,
                location: None,
                amount_context: None,
            }),
            stack.ledger.sweep_expired(Utc::now()),
        );

        // Gane quien gane la carrera, el veredicto del canje es expired
        // y la fila termina expired
        assert_eq!(
            outcome.unwrap().reject_reason(),
            Some(RejectReason::Expired)
        );
        assert_eq!(swept.unwrap(), 1);

        let row = stack.store.get_token(token_id).await.unwrap().unwrap();
        assert_eq!(row.status, TokenStatus::Expired);
        assert!(row.used_at.is_none());
    }

    #[tokio::test]
    async fn test_sweep_never_resurrects_used_tokens() {
        let stack = setup_stack();
        let issued = issue_coupon(&stack, 60).await;

        let outcome = stack
            .ledger
            .redeem(RedeemRequest {
                token_id: issued.token_id,
                redeemer_id: 42,
                location: None,
                amount_context: None,
            })
            .await
            .unwrap();
        assert!(outcome.is_redeemed());

        // Un barrido con corte posterior al vencimiento no toca filas used
        let cutoff = issued.expires_at + Duration::seconds(120);
        let swept = stack.ledger.sweep_expired(cutoff).await.unwrap();
        assert_eq!(swept, 0);

        let row = stack
            .store
            .get_token(issued.token_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, TokenStatus::Used);
        assert_eq!(row.redeemed_by, Some(42));
    }
}
