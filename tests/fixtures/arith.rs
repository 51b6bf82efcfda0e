suite!({
    sum: {
        test: sum_args,
        input: [[1, 2], [3, 4]],
        output: [3, 8],
    },
    doubled: {
        test: double,
        input: [1, 2, "x"],
        fresh: {},
        words: {
            input: ["a", "b c"],
            output: [
                null,
                "stale",
            ],
        },
    },
    counted: {
        test: count_up,
        input: [2, 0],
        output: [[1, 2], []],
    },
})
