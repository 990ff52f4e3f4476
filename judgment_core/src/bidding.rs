/// 计算当前可叫的数
///
/// 正常情况下可以叫 `0..=round`。当只剩最后一个人没叫时，
/// 去掉那个会让所有人叫数之和正好等于本轮牌数的值，保证这一轮不可能人人都叫中。
pub fn available_bids(round: u8, bids: impl IntoIterator<Item = Option<u8>>) -> Vec<u8> {
    let mut placed_sum: u32 = 0;
    let mut pending = 0usize;
    for bid in bids {
        match bid {
            Some(b) => placed_sum += u32::from(b),
            None => pending += 1,
        }
    }

    let all = 0..=round;
    if pending != 1 {
        return all.collect();
    }

    let forbidden = u32::from(round).checked_sub(placed_sum);
    all.filter(|b| Some(u32::from(*b)) != forbidden).collect()
}
