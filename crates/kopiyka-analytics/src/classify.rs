//! Transaction kind classification.
//!
//! A pure function of (amount sign, mcc, description). The transfer MCC set
//! and keyword list are fixed constants; changing them changes every derived
//! report, so they live here and nowhere else.

use kopiyka_core::TxKind;

/// MCCs the upstream uses for card-to-card and quasi-cash transfers.
pub const TRANSFER_MCC: [u16; 2] = [4829, 6536];

const TRANSFER_KEYWORDS: [&str; 5] = ["переказ", "перевод", "transfer", "card to card", "p2p"];

pub fn is_transfer(mcc: Option<u16>, description: &str) -> bool {
    if let Some(mcc) = mcc {
        if TRANSFER_MCC.contains(&mcc) {
            return true;
        }
    }
    let d = description.to_lowercase();
    TRANSFER_KEYWORDS.iter().any(|k| d.contains(k))
}

/// amount: negative = money out, positive = money in.
pub fn classify(amount: i64, mcc: Option<u16>, description: &str) -> TxKind {
    if is_transfer(mcc, description) {
        if amount < 0 {
            TxKind::TransferOut
        } else {
            TxKind::TransferIn
        }
    } else if amount < 0 {
        TxKind::Spend
    } else {
        TxKind::Income
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_mcc_wins_over_description() {
        assert_eq!(classify(-1000, Some(4829), "anything"), TxKind::TransferOut);
        assert_eq!(classify(1000, Some(6536), "anything"), TxKind::TransferIn);
    }

    #[test]
    fn transfer_keywords_match_case_insensitively() {
        assert_eq!(classify(-1000, None, "Переказ на картку"), TxKind::TransferOut);
        assert_eq!(classify(500, None, "P2P transfer incoming"), TxKind::TransferIn);
        assert_eq!(classify(-500, None, "CARD TO CARD"), TxKind::TransferOut);
    }

    #[test]
    fn sign_decides_spend_vs_income() {
        assert_eq!(classify(-1000, Some(5814), "mcdonalds"), TxKind::Spend);
        assert_eq!(classify(30000, None, "Salary"), TxKind::Income);
        // zero counts as money in
        assert_eq!(classify(0, None, ""), TxKind::Income);
    }

    #[test]
    fn every_input_maps_to_exactly_one_kind() {
        // classifier exhaustiveness over a grid of inputs
        let amounts = [-10_000, -1, 0, 1, 10_000];
        let mccs = [None, Some(1000), Some(4829), Some(5814), Some(6536)];
        let descs = ["", "atb", "переказ", "p2p", "uber trip"];
        for &amount in &amounts {
            for &mcc in &mccs {
                for &desc in &descs {
                    let kind = classify(amount, mcc, desc);
                    assert!(matches!(
                        kind,
                        TxKind::Income | TxKind::Spend | TxKind::TransferIn | TxKind::TransferOut
                    ));
                }
            }
        }
    }
}
