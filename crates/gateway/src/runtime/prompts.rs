//! Per-turn prompt builders.
//!
//! Each builder produces an *ephemeral* instruction message: it is passed
//! to the model alongside the slot's conversation but never appended to
//! the store, so conversations only accrete what was actually said.

use rr_domain::slot::SlotId;

use super::routing::Peer;

pub fn respond_instruction() -> String {
    "Answer the visitor's words above in your own voice. One to three \
     sentences, spoken aloud, no stage directions. Pick the voice profile \
     that fits your delivery."
        .to_owned()
}

pub fn comment_instruction(peers: &[Peer]) -> String {
    let mut prompt = String::from(
        "The other voices answered too. Pick exactly one of them and speak \
         a short comment directly to it — tease, agree, push back, whatever \
         feels true. At most two sentences.\n\nThe voices you may address:\n",
    );
    for peer in peers {
        prompt.push_str(&format!(
            "- slot {} ({}): \"{}\"\n",
            peer.slot_id, peer.agent_id, peer.text
        ));
    }
    prompt.push_str(
        "\nReply with the slot number you are addressing, your comment, and \
         your voice profile.",
    );
    prompt
}

pub fn reply_instruction(own_response: &str, incoming: &[(SlotId, String)]) -> String {
    let mut prompt = format!(
        "You said: \"{own_response}\"\n\nThese voices spoke to you about it:\n"
    );
    for (from, comment) in incoming {
        prompt.push_str(&format!("- slot {from}: \"{comment}\"\n"));
    }
    prompt.push_str(
        "\nAnswer them together in one breath — one to three sentences, \
         spoken aloud. Pick the voice profile that fits.",
    );
    prompt
}

pub fn summary_instruction(lines: &[(SlotId, String)]) -> String {
    let mut prompt = String::from(
        "The dialogue over the water is ending. Everything that was said, \
         in order:\n",
    );
    for (slot, text) in lines {
        prompt.push_str(&format!("- slot {slot}: \"{text}\"\n"));
    }
    prompt.push_str(
        "\nDistill the whole exchange into a single poetic paragraph — the \
         water's own closing words. No lists, no slot numbers, just the \
         paragraph. Pick the voice profile that fits its mood.",
    );
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use rr_domain::agent::AgentId;

    fn slot(n: u8) -> SlotId {
        SlotId::new(n).unwrap()
    }

    #[test]
    fn comment_prompt_lists_every_peer() {
        let peers = vec![
            Peer {
                slot_id: slot(3),
                agent_id: AgentId::Tide,
                text: "slow certainty".into(),
            },
            Peer {
                slot_id: slot(5),
                agent_id: AgentId::Depth,
                text: "from the floor".into(),
            },
        ];
        let prompt = comment_instruction(&peers);
        assert!(prompt.contains("slot 3 (tide)"));
        assert!(prompt.contains("slot 5 (depth)"));
        assert!(prompt.contains("slow certainty"));
    }

    #[test]
    fn reply_prompt_carries_own_words_and_comments() {
        let prompt = reply_instruction(
            "I circle outward",
            &[(slot(1), "you never settle".into())],
        );
        assert!(prompt.contains("I circle outward"));
        assert!(prompt.contains("slot 1"));
        assert!(prompt.contains("you never settle"));
    }

    #[test]
    fn summary_prompt_is_temporal() {
        let lines = vec![
            (slot(1), "first".to_owned()),
            (slot(2), "second".to_owned()),
        ];
        let prompt = summary_instruction(&lines);
        let first = prompt.find("first").unwrap();
        let second = prompt.find("second").unwrap();
        assert!(first < second);
    }
}
