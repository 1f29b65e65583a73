//! 佣金拆分计算器
//!
//! 纯函数实现：无I/O、无副作用，相同输入永远得到相同输出。
//! 金额一律使用货币最小单位(u64)，禁止浮点，保证四份之和恰好等于捐赠金额。

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 费率以基点(bps, 1/10000)表示
pub const BPS_DENOMINATOR: u64 = 10_000;
/// 艺术家(受赠人)份额: 80%
pub const RECIPIENT_SHARE_BPS: u64 = 8_000;
/// 一级推荐人份额: 2.5%
pub const TIER1_SHARE_BPS: u64 = 250;
/// 二级推荐人份额: 2.5%
pub const TIER2_SHARE_BPS: u64 = 250;

/// 推荐链：受赠人的上级与上上级(缺失的层级不参与分成)
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ReferralChain {
    /// 一级推荐人(上级)
    pub tier1_id: Option<String>,
    /// 二级推荐人(上上级)
    pub tier2_id: Option<String>,
}

impl ReferralChain {
    pub fn empty() -> Self {
        Self::default()
    }

    /// 由祖先链(最多2个,由近到远)构造
    pub fn from_ancestors(ancestors: &[String]) -> Self {
        Self {
            tier1_id: ancestors.first().cloned(),
            tier2_id: ancestors.get(1).cloned(),
        }
    }
}

/// 一笔捐赠的四份拆分结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Split {
    /// 艺术家份额
    pub recipient_share: u64,
    /// 一级推荐佣金(无一级推荐人时为0,归入平台)
    pub tier1_share: u64,
    /// 二级推荐佣金(无二级推荐人时为0,归入平台)
    pub tier2_share: u64,
    /// 平台份额(承接所有截断余数与无人认领的层级)
    pub platform_share: u64,
}

impl Split {
    pub fn total(&self) -> u64 {
        self.recipient_share + self.tier1_share + self.tier2_share + self.platform_share
    }

    /// 校验拆分不变量：四份之和恰好等于捐赠金额，
    /// 且两级佣金之和不超过非艺术家份额(政策上限5%)。
    /// 失败意味着费率或舍入逻辑出了bug，该笔捐赠必须中止入账。
    pub fn verify(&self, donation_amount: u64) -> bool {
        if self.total() != donation_amount {
            return false;
        }

        let affiliate_cap = share_of(donation_amount, TIER1_SHARE_BPS + TIER2_SHARE_BPS);
        self.tier1_share + self.tier2_share <= affiliate_cap
    }
}

fn share_of(amount: u64, bps: u64) -> u64 {
    // 截断到最小货币单位，余数最终落入平台份额。
    // 中间积用u128：amount接近u64::MAX时amount*bps会溢出u64，
    // bps ≤ 10000保证结果永远收得回u64。
    (amount as u128 * bps as u128 / BPS_DENOMINATOR as u128) as u64
}

/// 计算一笔捐赠的拆分
///
/// 80% 归艺术家，一级/二级推荐人各2.5%(对应层级存在时)，
/// 平台拿剩余部分。缺失层级的2.5%不会发给任何人，直接并入平台份额。
pub fn compute_split(donation_amount: u64, chain: &ReferralChain) -> Split {
    let recipient_share = share_of(donation_amount, RECIPIENT_SHARE_BPS);

    let tier1_share = match chain.tier1_id {
        Some(_) => share_of(donation_amount, TIER1_SHARE_BPS),
        None => 0,
    };
    let tier2_share = match chain.tier2_id {
        Some(_) => share_of(donation_amount, TIER2_SHARE_BPS),
        None => 0,
    };

    // 平台份额 = 余额，因此总和恒等于捐赠金额
    let platform_share = donation_amount - recipient_share - tier1_share - tier2_share;

    Split {
        recipient_share,
        tier1_share,
        tier2_share,
        platform_share,
    }
}
