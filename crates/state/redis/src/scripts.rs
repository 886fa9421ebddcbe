//! Lua scripts executed atomically on the Redis server so that
//! check-and-set / compare-and-swap are race-free across concurrent
//! gateway replicas talking to the same Redis instance.

/// `KEYS[1]` = plain string key, `KEYS[2]` = versioned hash key.
/// `ARGV[1]` = value, `ARGV[2]` = ttl in milliseconds (0 = no TTL).
/// Returns 1 if the key was newly created, 0 if it already existed.
pub const CHECK_AND_SET: &str = r"
if redis.call('EXISTS', KEYS[2]) == 1 then
    return 0
end
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1])
if tonumber(ARGV[2]) > 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[2])
end
return 1
";

/// `KEYS[1]` = versioned hash key.
/// `ARGV[1]` = expected version, `ARGV[2]` = new value, `ARGV[3]` = ttl ms.
/// Returns `{1, new_version}` on success, `{0, current_version, current_value|false}`
/// on conflict.
pub const COMPARE_AND_SWAP: &str = r"
local cur_ver = redis.call('HGET', KEYS[1], 'ver')
if cur_ver == false then
    cur_ver = 0
else
    cur_ver = tonumber(cur_ver)
end
local expected = tonumber(ARGV[1])
if cur_ver ~= expected then
    local cur_val = redis.call('HGET', KEYS[1], 'v')
    return {0, cur_ver, cur_val}
end
local new_ver = cur_ver + 1
redis.call('HSET', KEYS[1], 'v', ARGV[2], 'ver', new_ver)
if tonumber(ARGV[3]) > 0 then
    redis.call('PEXPIRE', KEYS[1], ARGV[3])
end
return {1, new_ver}
";
