use proptest::prelude::*;

use relay_hub::envelope::{decode_inbound, encode_chat, encode_user_list};
use relay_hub::{ChatMessage, Inbound};

fn arb_chat() -> impl Strategy<Value = ChatMessage> {
    (".{0,16}", proptest::option::of(".{0,8}"), ".{0,64}").prop_map(|(from, to, content)| {
        match to {
            Some(to) => ChatMessage::directed(from, to, content),
            None => ChatMessage::broadcast(from, content),
        }
    })
}

proptest! {
    #[test]
    fn decode_never_panics(input in ".*") {
        let _ = decode_inbound(&input);
    }

    #[test]
    fn private_iff_recipient(chat in arb_chat()) {
        prop_assert_eq!(chat.is_private, chat.to.as_deref().is_some_and(|to| !to.is_empty()));
    }

    #[test]
    fn encoded_chat_is_accepted_back(chat in arb_chat()) {
        let frame = encode_chat(&chat).unwrap();
        prop_assert_eq!(decode_inbound(&frame).unwrap(), Inbound::Chat(chat));
    }

    #[test]
    fn user_list_preserves_names(names in proptest::collection::vec(".{0,12}", 0..8)) {
        let frame = encode_user_list(&names).unwrap();
        let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
        prop_assert_eq!(&value["type"], "userlist");
        let decoded: Vec<String> = serde_json::from_value(value["nicknames"].clone()).unwrap();
        prop_assert_eq!(decoded, names);
    }

    #[test]
    fn userlist_from_clients_is_rejected(names in proptest::collection::vec("[a-z]{1,6}", 0..4)) {
        let frame = encode_user_list(&names).unwrap();
        prop_assert!(decode_inbound(&frame).is_err());
    }
}
