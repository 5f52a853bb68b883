//! type_url 白名单过滤

use crate::config::AllowList;

/// 判断 type_url 是否允许转发
///
/// 白名单为空时全部放行；否则两侧 trim 后精确匹配（区分大小写）。
pub fn is_allowed(type_url: &str, allow_list: &AllowList) -> bool {
    allow_list.is_empty() || allow_list.contains(type_url)
}
