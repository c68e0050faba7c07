use crate::models::{GachaConfig, Scope};

/// 查找事件触发的配置
///
/// 候选条件：作用范围覆盖该事件，名称或触发词与 `text` 完全相等，
/// 且发送者满足身份组限制（如有）
/// 频道级配置优先于服务器级配置；同级时取 `configs` 中靠前的一个
pub fn match_gacha<'a>(
    configs: &'a [GachaConfig],
    scope: &Scope,
    text: &str,
    author_roles: &[String],
) -> Option<&'a GachaConfig> {
    if text.is_empty() {
        return None;
    }

    let mut guild_wide = None;
    for config in configs
        .iter()
        .filter(|c| c.scope.covers(scope))
        .filter(|c| c.responds_to(text))
        .filter(|c| c.permits(author_roles))
    {
        if config.is_channel_scoped() {
            return Some(config);
        }
        guild_wide.get_or_insert(config);
    }
    guild_wide
}
