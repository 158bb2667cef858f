/// Lua script for the fixed window counter
///
/// Runs atomically inside Redis, so concurrent callers for the same key always
/// observe distinct counts. The expiry is only set when the key carries none
/// (`TTL == -1`), which keeps later increments from stretching the window. This is
/// the `EXPIRE key ttl NX` behaviour, expressed so it also works before Redis 7.
///
/// KEYS[1] = the counter key
/// ARGV[1] = window duration (seconds)
///
/// Returns: the post-increment count
pub const INCREMENT_WITH_EXPIRY_SCRIPT: &str = r#"
local key = KEYS[1]
local window = tonumber(ARGV[1])

local current = redis.call('INCR', key)

if redis.call('TTL', key) == -1 then
    redis.call('EXPIRE', key, window)
end

return current
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_sets_expiry_only_when_absent() {
        assert!(INCREMENT_WITH_EXPIRY_SCRIPT.contains("INCR"));
        assert!(INCREMENT_WITH_EXPIRY_SCRIPT.contains("'TTL', key) == -1"));
        assert_eq!(INCREMENT_WITH_EXPIRY_SCRIPT.matches("EXPIRE").count(), 1);
    }
}
