//! Lua scripts for atomic set updates.
//!
//! Redis runs a script to completion before serving any other command, so a
//! check followed by a write inside one script cannot interleave with a
//! concurrent `SADD` or `SREM` from another client.

/// Lua script for a conditional element swap within a set.
///
/// For each `(old, new)` pair, `old` is replaced with `new` only if `old` is
/// still a member. Pairs whose `old` element has disappeared (purged or
/// rewritten by another client) are skipped, so nothing is resurrected and
/// elements added concurrently are left untouched.
///
/// Membership of every `old` is checked first, then all of them are removed,
/// then all of their `new` elements are added. A `new` element that equals
/// another pair's `old` therefore survives the swap.
///
/// Arguments:
/// - KEYS[1]: Set key
/// - ARGV[1], ARGV[2], ...: Alternating old and new elements
///
/// Returns:
/// - Number of pairs applied
/// - -1: Odd number of arguments
pub const SET_SWAP: &str = r#"
if #ARGV % 2 ~= 0 then
    return -1
end

local olds = {}
local news = {}
for i = 1, #ARGV, 2 do
    if redis.call('SISMEMBER', KEYS[1], ARGV[i]) == 1 then
        table.insert(olds, ARGV[i])
        table.insert(news, ARGV[i + 1])
    end
end

if #olds == 0 then
    return 0
end

redis.call('SREM', KEYS[1], unpack(olds))
redis.call('SADD', KEYS[1], unpack(news))

return #olds
"#;
