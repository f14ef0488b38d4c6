//! Registry-wide invariants under arbitrary operation sequences and
//! concurrent writers.

use std::collections::{HashMap, HashSet};
use std::thread;

use chrono::NaiveDate;
use holdcert_core::{CertificateId, ClientId, DecimalAmount, InvestmentId, Timestamp};
use holdcert_crypto::{ArtifactSignature, SignatureMode};
use holdcert_state::{
    ArtifactRecord, CertificateFilter, CertificateRegistry, CertificateStatus, CertificateType,
    NewCertificate, TransitionEvidence,
};
use proptest::prelude::*;

fn ev() -> TransitionEvidence {
    TransitionEvidence::by("prop").at(Timestamp::parse("2026-08-20T08:00:00Z").unwrap())
}

fn draft(ty: CertificateType, investment: u32) -> NewCertificate {
    NewCertificate {
        certificate_type: ty,
        investment_id: InvestmentId::new(format!("I-{investment}")).unwrap(),
        client_id: ClientId::new("C-1").unwrap(),
        template_id: None,
        issue_date: NaiveDate::from_ymd_opt(2026, 8, 20).unwrap(),
        expiry_date: NaiveDate::from_ymd_opt(2027, 8, 20).unwrap(),
        investment_amount: None,
        number_of_shares: 1,
        share_price: DecimalAmount::new("1").unwrap(),
    }
}

fn artifact() -> ArtifactRecord {
    ArtifactRecord {
        storage_key: "k.pdf".into(),
        location: "simulated://k.pdf".into(),
        size_bytes: 1,
        content_hash: "00".repeat(32),
        signature: ArtifactSignature::from_stored("FALLBACK-SIG:00"),
        signature_mode: SignatureMode::Fallback,
        signed_at: ev().at,
    }
}

fn pick(ids: &[CertificateId], n: usize) -> Option<CertificateId> {
    (!ids.is_empty()).then(|| ids[n % ids.len()])
}

#[derive(Debug, Clone)]
enum Op {
    Create(usize, u32),
    Generate(usize),
    Revoke(usize),
    Expire(usize),
    Renew(usize),
    Deactivate(usize),
    Reactivate(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..5, 0u32..4).prop_map(|(t, i)| Op::Create(t, i)),
        any::<usize>().prop_map(Op::Generate),
        any::<usize>().prop_map(Op::Revoke),
        any::<usize>().prop_map(Op::Expire),
        any::<usize>().prop_map(Op::Renew),
        any::<usize>().prop_map(Op::Deactivate),
        any::<usize>().prop_map(Op::Reactivate),
    ]
}

proptest! {
    #[test]
    fn invariants_hold_for_any_operation_sequence(ops in proptest::collection::vec(op(), 1..80)) {
        let reg = CertificateRegistry::new();
        let mut ids = Vec::new();
        let lapsed = NaiveDate::from_ymd_opt(2027, 9, 1).unwrap();

        for op in ops {
            // Rejections are expected; only the invariants matter.
            let _ = match op {
                Op::Create(t, i) => reg
                    .create(draft(CertificateType::ALL[t], i), &ev())
                    .map(|c| ids.push(c.id)),
                Op::Generate(n) => match pick(&ids, n) {
                    Some(id) => reg.commit_artifact(id, artifact(), &ev()).map(drop),
                    None => Ok(()),
                },
                Op::Revoke(n) => match pick(&ids, n) {
                    Some(id) => reg.revoke(id, &ev()).map(drop),
                    None => Ok(()),
                },
                Op::Expire(n) => match pick(&ids, n) {
                    Some(id) => reg.mark_expired(id, lapsed, &ev()).map(drop),
                    None => Ok(()),
                },
                Op::Renew(n) => match pick(&ids, n) {
                    Some(id) => reg.renew(id, 12, &ev()).map(drop),
                    None => Ok(()),
                },
                Op::Deactivate(n) => match pick(&ids, n) {
                    Some(id) => reg.set_status(id, CertificateStatus::Inactive, &ev()).map(drop),
                    None => Ok(()),
                },
                Op::Reactivate(n) => match pick(&ids, n) {
                    Some(id) => reg.set_status(id, CertificateStatus::Active, &ev()).map(drop),
                    None => Ok(()),
                },
            };

            let all = reg.list(&CertificateFilter::default());
            let mut active_per_investment: HashMap<_, usize> = HashMap::new();
            for c in all.iter().filter(|c| c.is_active()) {
                *active_per_investment.entry(c.investment_id.clone()).or_default() += 1;
            }
            prop_assert!(active_per_investment.values().all(|&n| n <= 1));

            let numbers: HashSet<_> = all.iter().map(|c| c.certificate_number).collect();
            prop_assert_eq!(numbers.len(), all.len());

            for c in all.iter().filter(|c| c.is_active()) {
                prop_assert!(c.artifact.is_some());
            }
        }
    }
}

#[test]
fn concurrent_creates_never_share_a_number() {
    let reg = CertificateRegistry::new();
    let handles: Vec<_> = (0u32..8)
        .map(|t| {
            let reg = reg.clone();
            thread::spawn(move || {
                (0..50)
                    .map(|i| {
                        reg.create(draft(CertificateType::Share, t * 50 + i), &ev())
                            .map(|c| c.certificate_number)
                    })
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut numbers = HashSet::new();
    for h in handles {
        for n in h.join().unwrap() {
            assert!(numbers.insert(n.unwrap()), "duplicate number");
        }
    }
    assert_eq!(numbers.len(), 400);
    assert_eq!(reg.len(), 400);
}
