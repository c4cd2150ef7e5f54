#![no_main]

use libfuzzer_sys::fuzz_target;

use stakepool_pool::PoolState;

// Decoding an arbitrary snapshot must never panic, and anything that decodes
// must have consistent share totals and re-encode to an equal state.
fuzz_target!(|data: &[u8]| {
    if let Ok(state) = PoolState::decode(data) {
        assert_eq!(state.summed_shares(), Some(state.total_shares));
        if let Ok(bytes) = state.encode() {
            assert_eq!(PoolState::decode(&bytes).ok(), Some(state));
        }
    }
});
