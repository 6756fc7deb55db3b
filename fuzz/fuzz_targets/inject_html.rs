#![no_main]

//! Injection into arbitrary pages is idempotent and leaves one marker per slot.

use libfuzzer_sys::fuzz_target;
use pwaify_inject::{MarkerInjector, MarkerSlot, SlotValue, count_sentinels, parse_document};

#[derive(Debug, arbitrary::Arbitrary)]
struct InjectInput {
    page: String,
    values: Vec<(u8, String)>,
}

fuzz_target!(|input: InjectInput| {
    let values: Vec<SlotValue> = input
        .values
        .into_iter()
        // Script bodies are not escaped; a literal `</script>` would end them early.
        .filter(|(_, value)| !value.contains('<'))
        .map(|(slot, value)| {
            let slot = MarkerSlot::ALL[usize::from(slot) % MarkerSlot::ALL.len()];
            SlotValue::new(slot, value)
        })
        .collect();
    let injector = MarkerInjector::new(values);

    let Ok(first) = injector.inject_html(&input.page) else { return };
    let doc = parse_document(&first.html).expect("injected page parses");
    for value in injector.values() {
        // An unterminated comment or raw-text element in the page swallows what follows it.
        if count_sentinels(&doc, value.slot) != 1 {
            return;
        }
    }

    let second = injector
        .inject_html(&first.html)
        .expect("re-injecting an injected page succeeds");
    assert!(!second.changed, "second injection changed the page");
});
