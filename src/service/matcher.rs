use crate::models::{ExtractedCandidate, Resident};
use rayon::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// 自动选中住户所需的最低得分
pub const MATCH_THRESHOLD: u32 = 5;

/// 自动匹配结果 (仅供参考，操作员可改)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResidentMatch {
    pub resident_id: Uuid,
    pub display_name: String,
    pub score: u32,
}

/// 计算单个住户与候选记录的匹配得分 (只加分)
pub fn score(resident: &Resident, candidate: &ExtractedCandidate) -> u32 {
    let mut score = 0;

    if !candidate.payer_info.is_empty() && !resident.name.is_empty() {
        score += name_score(&candidate.payer_info, &resident.name);
    }

    if let Some(email) = resident.email.as_deref().filter(|e| !e.is_empty()) {
        if !candidate.upi_id.is_empty() {
            score += email_score(&candidate.upi_id, email);
        }
    }

    if let Some(phone) = resident.phone.as_deref() {
        score += phone_score(phone, &candidate.payer_info, &candidate.upi_id);
    }

    score
}

fn name_score(payer_info: &str, name: &str) -> u32 {
    let payer = payer_info.to_lowercase();
    let name = name.to_lowercase();

    if payer.contains(&name) {
        return 5;
    }

    let mut score = 0;
    for payer_word in payer.split_whitespace() {
        let payer_len = payer_word.chars().count();
        for name_word in name.split_whitespace() {
            let name_len = name_word.chars().count();
            if payer_word == name_word && payer_len > 2 {
                score += 3;
            } else if (payer_word.contains(name_word) && name_len > 2)
                || (name_word.contains(payer_word) && payer_len > 2)
            {
                score += 2;
            }
        }
    }
    score
}

fn email_score(upi_id: &str, email: &str) -> u32 {
    let upi = upi_id.to_lowercase();
    let email = email.to_lowercase();

    if upi == email {
        return 10;
    }

    let upi_local = local_part(&upi);
    let email_local = local_part(&email);
    if upi_local == email_local {
        8
    } else if !upi_local.is_empty()
        && !email_local.is_empty()
        && (upi_local.contains(email_local) || email_local.contains(upi_local))
    {
        5
    } else {
        0
    }
}

fn local_part(handle: &str) -> &str {
    handle.split('@').next().unwrap_or("")
}

fn phone_score(phone: &str, payer_info: &str, upi_id: &str) -> u32 {
    let digits: String = phone.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if digits.is_empty() {
        return 0;
    }
    let last10 = suffix(&digits, 10);
    let last6 = suffix(&digits, 6);
    let last4 = suffix(&digits, 4);

    let mut score = 0;
    if !payer_info.is_empty() {
        if payer_info.contains(last10) {
            score += 8;
        } else if payer_info.contains(last6) {
            score += 4;
        } else if payer_info.contains(last4) {
            score += 2;
        }
    }

    // 9876543210@ybl 这类 UPI 账号
    if !upi_id.is_empty() {
        if upi_id.contains(last10) {
            score += 8;
        } else if upi_id.contains(last6) {
            score += 4;
        }
    }
    score
}

/// 末尾 n 个字符，不足则整串
fn suffix(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    match s.char_indices().nth(count - n) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// 在住户列表中选出得分最高者
///
/// 按列表顺序扫描，只有严格更高的分数才替换当前最佳，
/// 最高分低于 [`MATCH_THRESHOLD`] 时不选。
pub fn best_match<'a, I>(residents: I, candidate: &ExtractedCandidate) -> Option<ResidentMatch>
where
    I: IntoParallelIterator<Item = &'a Resident>,
    I::Iter: IndexedParallelIterator,
{
    if !candidate.has_payer_signal() {
        tracing::debug!("No payer info or UPI ID to match with");
        return None;
    }

    // 并行计算得分，顺序保持不变
    let scored: Vec<(&Resident, u32)> = residents
        .into_par_iter()
        .map(|r| (r, score(r, candidate)))
        .collect();

    let mut best: Option<(&Resident, u32)> = None;
    for (resident, s) in scored {
        let is_better = match best {
            None => s > 0,
            Some((_, best_score)) => s > best_score,
        };
        if is_better {
            best = Some((resident, s));
        }
    }

    match best {
        Some((resident, s)) if s >= MATCH_THRESHOLD => {
            tracing::info!("Found resident match: {} with score {}", resident.display_name, s);
            Some(ResidentMatch {
                resident_id: resident.id,
                display_name: resident.display_name.clone(),
                score: s,
            })
        }
        _ => {
            tracing::info!("No strong resident match found");
            None
        }
    }
}
